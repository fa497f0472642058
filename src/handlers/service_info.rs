use crate::formats;
use crate::types::{Endpoint, HtsgetCapabilities, Organization, ServiceInfo, ServiceType};
use axum::Json;

pub async fn service_info() -> Json<ServiceInfo> {
    Json(describe(Endpoint::Reads))
}

pub async fn reads_service_info() -> Json<ServiceInfo> {
    Json(describe(Endpoint::Reads))
}

pub async fn variants_service_info() -> Json<ServiceInfo> {
    Json(describe(Endpoint::Variants))
}

fn describe(endpoint: Endpoint) -> ServiceInfo {
    ServiceInfo {
        id: "org.example.htsget-slice".to_string(),
        name: "htsget-slice".to_string(),
        r#type: ServiceType {
            group: "org.ga4gh".to_string(),
            artifact: "htsget".to_string(),
            version: "1.3.0".to_string(),
        },
        description: Some("htsget ticket server for indexed BAM, VCF and BCF".to_string()),
        organization: Organization {
            name: "Example Organization".to_string(),
            url: "https://example.org".to_string(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        htsget: HtsgetCapabilities {
            datatype: endpoint.datatype().to_string(),
            formats: formats::supported_for(endpoint),
            fields_parameter_effective: false,
            tags_parameters_effective: false,
        },
    }
}
