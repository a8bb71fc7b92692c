use super::handlers::{auth, exercises, health, members, workouts};
use utoipa::openapi::{
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Name of the bearer scheme referenced by `security(("bearer" = []))`.
pub(crate) const BEARER_SCHEME: &str = "bearer";

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Router that both serves the endpoints and produces the `OpenAPI` document.
///
/// Handlers sharing a path must be registered in the same `routes!` call.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::healthcheck))
        .routes(routes!(members::register_member, members::member_by_email))
        .routes(routes!(members::current_member))
        .routes(routes!(members::reset_password))
        .routes(routes!(members::update_member, members::delete_member))
        .routes(routes!(members::activate_member))
        .routes(routes!(workouts::list_member_workouts))
        .routes(routes!(auth::tokens::create_authentication_token))
        .routes(routes!(auth::tokens::create_activation_token))
        .routes(routes!(auth::tokens::create_password_reset_token))
        .routes(routes!(
            exercises::list_exercises,
            exercises::create_exercise
        ))
        .routes(routes!(
            exercises::get_exercise,
            exercises::update_exercise,
            exercises::delete_exercise
        ))
        .routes(routes!(workouts::create_workout))
        .routes(routes!(workouts::delete_workout));

    let openapi = router.get_openapi_mut();
    openapi.tags = Some(vec![
        tag("health", "Service and database status"),
        tag("members", "Registration, activation and member profiles"),
        tag("tokens", "Session login and mailed single-use tokens"),
        tag("exercises", "Exercise catalogue"),
        tag("workouts", "Workout sessions and their sets"),
    ]);
    openapi
        .components
        .get_or_insert_with(Components::new)
        .add_security_scheme(
            BEARER_SCHEME,
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(non_empty(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = non_empty(env!("CARGO_PKG_LICENSE")).map(|spdx| {
        let mut license = License::new(spdx);
        license.identifier = Some(spdx.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

/// First entry of `CARGO_PKG_AUTHORS` (`;` separated, `Name <email>`).
fn cargo_contact() -> Option<Contact> {
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next()?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
