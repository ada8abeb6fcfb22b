use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Haul API",
        version = "0.1.0",
        description = "Media acquisition service: submit a URL, poll the job, fetch the file."
    ),
    paths(
        crate::routes::submit_download,
        crate::routes::list_downloads,
        crate::routes::get_download,
        crate::routes::download_file,
        crate::routes::upload_credential,
        crate::routes::run_cleanup,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::SubmitDownloadRequest,
        crate::dto::SubmitDownloadResponse,
        crate::dto::DownloadResponse,
        crate::dto::DownloadListResponse,
        crate::dto::CredentialUploadResponse,
        crate::dto::CleanupResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "downloads", description = "Acquisition jobs and their artifacts"),
        (name = "admin", description = "Credential upload and manual cleanup"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin token. Set via HAUL_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
