use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Rally API",
        version = "0.1.0",
        description = "Staged bulk invitations: prepare, confirm and execute invite and slot batches"
    ),
    servers(
        (url = "/api", description = "API base path")
    )
)]
struct RallyDoc;

/// Service document with the invitation routes merged in at the API root.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = RallyDoc::openapi();
        doc.merge(domain_invitations::handlers::ApiDoc::openapi());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_paths_are_documented() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/threads/prepare-send"));
        assert!(paths.iter().any(|p| p.as_str() == "/pending-actions/{token}/execute"));
        assert_eq!(doc.info.title, "Rally API");
    }
}
