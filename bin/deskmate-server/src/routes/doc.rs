use crate::routes::{admin, auth, changelog, chat, excel, health, notifications};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "deskmate-server",
    description = "Persona chat, changelog notifications, user admin and Excel photo reports",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(auth::AuthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(changelog::ChangelogApi::openapi());
    root.merge(notifications::NotificationsApi::openapi());
    root.merge(excel::ExcelApi::openapi());
    root.merge(admin::api_docs());

    let components = root.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "bearer",
        SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
    );
    root
}
