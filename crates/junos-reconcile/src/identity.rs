//! Device identity snapshot taken at connect time.

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::{ReconcileError, ReconcileResult};

/// RPC issued right after the transport comes up.
pub const GET_SOFTWARE_INFORMATION: &str = "<get-software-information/>";

/// Hostname, model and software of the connected device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub hostname: String,
    pub model: String,
    pub os_name: String,
    pub version: String,
    /// The device answered as a chassis-cluster member.
    pub cluster: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SoftwareInformation {
    #[serde(rename = "host-name", default)]
    host_name: String,
    #[serde(rename = "product-model", default)]
    product_model: String,
    #[serde(rename = "junos-version", default)]
    junos_version: String,
    #[serde(rename = "package-information", default)]
    packages: Vec<PackageInformation>,
}

#[derive(Debug, Default, Deserialize)]
struct PackageInformation {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct MultiRoutingEngineResults {
    #[serde(rename = "multi-routing-engine-item", default)]
    items: Vec<MultiRoutingEngineItem>,
}

#[derive(Debug, Default, Deserialize)]
struct MultiRoutingEngineItem {
    #[serde(rename = "software-information", default)]
    software: Option<SoftwareInformation>,
}

impl DeviceIdentity {
    /// Parses a `get-software-information` reply.
    ///
    /// Cluster members wrap one `<software-information>` per node in
    /// `<multi-routing-engine-results>`; the first node describes the
    /// device. Tags the device leaves out become empty values.
    pub fn from_xml(reply: &str) -> ReconcileResult<Self> {
        if let Some(xml) = element(reply, "multi-routing-engine-results") {
            let results: MultiRoutingEngineResults = from_str(xml)
                .map_err(|e| ReconcileError::query(GET_SOFTWARE_INFORMATION, e))?;
            let software = results
                .items
                .into_iter()
                .find_map(|item| item.software)
                .unwrap_or_default();
            return Ok(Self::from_software(software, true));
        }

        let xml = element(reply, "software-information").ok_or_else(|| {
            ReconcileError::query(
                GET_SOFTWARE_INFORMATION,
                "reply carries no software-information",
            )
        })?;
        let software: SoftwareInformation =
            from_str(xml).map_err(|e| ReconcileError::query(GET_SOFTWARE_INFORMATION, e))?;
        Ok(Self::from_software(software, false))
    }

    fn from_software(software: SoftwareInformation, cluster: bool) -> Self {
        let os_name = software
            .packages
            .into_iter()
            .map(|package| package.name)
            .find(|name| !name.is_empty())
            .unwrap_or_default();
        Self {
            hostname: software.host_name,
            model: software.product_model,
            os_name,
            version: software.junos_version,
            cluster,
        }
    }
}

/// Cuts the outermost `name` element out of `reply`.
fn element<'a>(reply: &'a str, name: &str) -> Option<&'a str> {
    let start = reply.find(&format!("<{}", name))?;
    let close = format!("</{}>", name);
    let end = reply.rfind(&close)? + close.len();
    (end > start).then(|| &reply[start..end])
}
