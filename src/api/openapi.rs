use super::handlers::{auth, config, health};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Routes added outside (like
/// `/`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the
    // route to OpenAPI. Methods sharing a path must go in one routes! call.
    let mut fundsync_tag = Tag::new("fundsync");
    fundsync_tag.description = Some("Fundsync dashboard backend API".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Email sign-in and session management".to_string());

    let mut config_tag = Tag::new("config");
    config_tag.description = Some("Per-user config documents and sync polling".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![fundsync_tag, auth_tag, config_tag]);

    let router = OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(auth::signin::request_code))
        .routes(routes!(auth::signin::redeem_code))
        .routes(routes!(auth::session::session))
        .routes(routes!(auth::session::signout))
        .routes(routes!(
            config::get_config,
            config::replace_config,
            config::patch_config
        ))
        .routes(routes!(config::sync));

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    OpenApiBuilder::new().info(info).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "fundsync"));
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "config"));

        assert!(spec.paths.paths.contains_key("/auth/code"));
        assert!(spec.paths.paths.contains_key("/auth/redeem"));
        assert!(spec.paths.paths.contains_key("/auth/session"));
        assert!(spec.paths.paths.contains_key("/auth/signout"));
        assert!(spec.paths.paths.contains_key("/config"));
        assert!(spec.paths.paths.contains_key("/sync"));
    }

    #[test]
    fn config_path_carries_all_methods() {
        let value = serde_json::to_value(openapi()).expect("serialize spec");
        let config_path = value.pointer("/paths/~1config").expect("config path");
        assert!(config_path.get("get").is_some());
        assert!(config_path.get("post").is_some());
        assert!(config_path.get("patch").is_some());
    }
}
