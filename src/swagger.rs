use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{AchievementType, DonationStatus, DreamStatus, DreamType};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::dream::create_dream,
        handlers::dream::create_draft,
        handlers::dream::update_draft,
        handlers::dream::submit_draft,
        handlers::dream::update_dream,
        handlers::dream::delete_dream,
        handlers::dream::close_dream,
        handlers::dream::record_payment_details,
        handlers::dream::get_referral_donations,
        handlers::referral::subscribe_to_referrer,
        handlers::referral::community,
        handlers::donation::pay_donation,
        handlers::donation::seed_donation,
        handlers::donation::free_donation,
        handlers::donation::confirm_donation,
        handlers::donation::fail_donation,
        handlers::subscription::apply_subscription,
        handlers::achievement::my_achievements,
    ),
    components(
        schemas(
            DreamStatus,
            DreamType,
            DonationStatus,
            AchievementType,
            CreateDreamRequest,
            UpdateDreamRequest,
            DreamResponse,
            ReferralDreamSummary,
            PayDonationRequest,
            SeedDonationRequest,
            FreeDonationRequest,
            DonationResponse,
            ReferralDonationResponse,
            ConfirmDonationResponse,
            SubscribeReferralRequest,
            SubscribeReferralResponse,
            CommunityMember,
            SubscriptionRequest,
            SubscriptionResponse,
            AchievementResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "dream", description = "Dream lifecycle API"),
        (name = "referral", description = "Referral and community API"),
        (name = "donation", description = "Donation API"),
        (name = "subscription", description = "Subscription hook"),
        (name = "achievement", description = "Achievement API"),
    ),
    info(
        title = "Dreamfund Backend API",
        version = "1.0.0",
        description = "Referral donation and dream funding REST API"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
