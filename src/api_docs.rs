use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::loan::checkout,
        api::loan::return_loan,
        api::pickup::confirm_pickup,
        // Add other endpoints here as we document them
    ),
    tags(
        (name = "circdesk", description = "Circulation desk API")
    )
)]
pub struct ApiDoc;
