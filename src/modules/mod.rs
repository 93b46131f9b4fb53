//! Resource modules.
//!
//! Each module turns a slice of the configuration into resource
//! declarations on a [`StackBuilder`](crate::graph::StackBuilder) and
//! returns typed handles whose attributes resolve at deploy time.

pub mod database;
pub mod dns;
pub mod hosting;
pub mod resource_group;

pub use database::{DatabaseArgs, DatabaseHandle, ServerArgs, ServerHandle, declare_database, declare_server};
pub use dns::{
    DEFAULT_TTL_SECS, RecordArgs, RecordHandle, TxtValue, ZoneArgs, ZoneHandle, a_record,
    cname_record, declare_zone, mx_record, nameservers_export, txt_record,
};
pub use hosting::{
    AppHandle, BindingHandle, CertificateHandle, CustomDomainArgs, CustomDomainHandles,
    HostingArgs, HostingRole, PlanHandle, UpstreamSetting, bind_custom_domain, declare_hosting,
};
pub use resource_group::{ResourceGroupArgs, ResourceGroupHandle, declare_resource_group};

/// Value of the `Application` tag.
pub(crate) const APPLICATION: &str = "Infusethink";

/// Value of the `ManagedBy` tag.
pub(crate) const MANAGED_BY: &str = "infusethink";

/// Turns a hostname into a resource-name-safe slug.
pub(crate) fn slug(hostname: &str) -> String {
    hostname.replace('.', "-")
}
