//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oidc::OIDC_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Documents client authentication on the backend listener.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let basic = HttpBuilder::new()
                .scheme(HttpAuthScheme::Basic)
                .description(Some(
                    "Registered client id and secret. May also be sent as `client_id` and \
                     `client_secret` query or form parameters.",
                ))
                .build();
            components.add_security_scheme("ClientSecretBasic", SecurityScheme::Http(basic));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "OpenID Connect Identity Provider",
        version = "1.0.0",
        description = "Authorization code flow with password or client certificate login."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OIDC_TAG, description = "OpenID Connect endpoints")
    )
)]
pub struct ApiDoc;
