//! Public DNS zone and record sets.
//!
//! Every record constructor takes the same [`RecordArgs`] plus a
//! type-specific value. TXT values are normalized to an ordered list of
//! strings, none longer than 255 characters, which is the limit Azure DNS
//! enforces on a single TXT string.

use serde_json::{Value, json};

use crate::config::{MailExchange, TXT_SEGMENT_LIMIT, TagSet};
use crate::error::{GraphError, OutputError, Result};
use crate::graph::{Properties, ResourceKind, ResourceOptions, StackBuilder, Urn};
use crate::output::Output;

use super::resource_group::ResourceGroupHandle;

/// Default record TTL in seconds.
pub const DEFAULT_TTL_SECS: u32 = 3600;

/// Arguments for [`declare_zone`].
#[derive(Debug, Clone, Copy)]
pub struct ZoneArgs<'a> {
    /// Logical name, also the prefix of the nameserver export.
    pub logical_name: &'a str,
    /// Resource group to deploy into.
    pub resource_group: &'a ResourceGroupHandle,
    /// Apex domain.
    pub domain_name: &'a str,
    /// Caller tags, merged over the defaults.
    pub tags: &'a TagSet,
}

/// A declared DNS zone.
#[derive(Debug, Clone)]
pub struct ZoneHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Zone name.
    pub name: Output<String>,
    /// Apex domain.
    pub domain_name: String,
    /// Nameservers assigned by Azure.
    pub name_servers: Output<Vec<String>>,
}

/// Returns the export name carrying a zone's nameservers.
#[must_use]
pub fn nameservers_export(logical_name: &str) -> String {
    format!("{logical_name}_nameservers")
}

/// Declares a public zone and exports its nameservers as
/// `<logical_name>_nameservers`.
///
/// # Errors
///
/// Returns an error if the zone or its export was already declared.
pub fn declare_zone(builder: &mut StackBuilder, args: ZoneArgs<'_>) -> Result<ZoneHandle> {
    let defaults = TagSet::new()
        .with("Component", "DNS")
        .with("Domain", args.domain_name);
    let tags = TagSet::merge(&defaults, args.tags);

    let inputs = Properties::new()
        .set_value("name", args.domain_name)
        .set("resourceGroupName", args.resource_group.name.clone())
        // Zones are global regardless of the stack's region.
        .set_value("location", "global")
        .set_value("tags", &tags)
        .set_value("properties.zoneType", "Public");

    let urn = builder.register(
        ResourceKind::DnsZone,
        args.logical_name,
        inputs,
        ResourceOptions::new(),
    )?;

    let name_servers: Output<Vec<String>> = Output::attribute(&urn, "nameServers");
    builder.export(&nameservers_export(args.logical_name), name_servers.clone())?;

    Ok(ZoneHandle {
        name: Output::known_from(&urn, args.domain_name.to_string()),
        domain_name: args.domain_name.to_string(),
        name_servers,
        urn,
    })
}

/// Arguments shared by every record constructor.
#[derive(Debug, Clone, Copy)]
pub struct RecordArgs<'a> {
    /// Logical resource name.
    pub logical_name: &'a str,
    /// Resource group of the zone.
    pub resource_group: &'a ResourceGroupHandle,
    /// Zone holding the record.
    pub zone: &'a ZoneHandle,
    /// Name relative to the zone apex, `@` for the apex itself.
    pub relative_name: &'a str,
    /// Time to live in seconds.
    pub ttl: u32,
}

impl<'a> RecordArgs<'a> {
    /// Creates record arguments with the default TTL.
    #[must_use]
    pub const fn new(
        logical_name: &'a str,
        resource_group: &'a ResourceGroupHandle,
        zone: &'a ZoneHandle,
        relative_name: &'a str,
    ) -> Self {
        Self {
            logical_name,
            resource_group,
            zone,
            relative_name,
            ttl: DEFAULT_TTL_SECS,
        }
    }

    /// Overrides the TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A declared record set.
#[derive(Debug, Clone)]
pub struct RecordHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Fully qualified record name.
    pub fqdn: String,
}

/// Value of a TXT record.
#[derive(Debug, Clone)]
pub enum TxtValue {
    /// One logical string, split into segments if it is too long.
    Single(Output<String>),
    /// Segments already split by the caller, used as given.
    Chunks(Vec<String>),
}

impl From<&str> for TxtValue {
    fn from(value: &str) -> Self {
        Self::Single(Output::from(value))
    }
}

impl From<Output<String>> for TxtValue {
    fn from(value: Output<String>) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for TxtValue {
    fn from(chunks: Vec<String>) -> Self {
        Self::Chunks(chunks)
    }
}

impl TxtValue {
    /// Normalizes the value to an ordered list of segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or a pre-split segment is empty
    /// or exceeds the TXT limit.
    pub fn into_segments(self, logical_name: &str) -> Result<Output<Vec<String>>> {
        match self {
            Self::Single(value) => Ok(value.try_map(|text| {
                if text.is_empty() {
                    return Err(OutputError::transform("TXT value cannot be empty").into());
                }
                Ok(split_segments(&text))
            })),
            Self::Chunks(chunks) => {
                if chunks.is_empty() {
                    return Err(GraphError::InvalidInput {
                        resource: logical_name.to_string(),
                        message: String::from("TXT record needs at least one segment"),
                    }
                    .into());
                }
                if chunks.iter().any(String::is_empty) {
                    return Err(GraphError::InvalidInput {
                        resource: logical_name.to_string(),
                        message: String::from("TXT segments cannot be empty"),
                    }
                    .into());
                }
                if let Some(long) = chunks.iter().find(|c| c.chars().count() > TXT_SEGMENT_LIMIT) {
                    return Err(GraphError::InvalidInput {
                        resource: logical_name.to_string(),
                        message: format!(
                            "TXT segment of {} characters exceeds the {TXT_SEGMENT_LIMIT} character limit",
                            long.chars().count()
                        ),
                    }
                    .into());
                }
                Ok(Output::known(chunks))
            }
        }
    }
}

/// Splits text into segments of at most 255 characters.
fn split_segments(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(TXT_SEGMENT_LIMIT)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn record_inputs(args: &RecordArgs<'_>, record_type: &str) -> Properties {
    Properties::new()
        .set_value("name", args.relative_name)
        .set("parentName", args.zone.name.clone())
        .set("resourceGroupName", args.resource_group.name.clone())
        .set_value("recordType", record_type)
        .set_value("properties.TTL", args.ttl)
}

fn register_record(
    builder: &mut StackBuilder,
    args: &RecordArgs<'_>,
    inputs: Properties,
) -> Result<RecordHandle> {
    let urn = builder.register(
        ResourceKind::RecordSet,
        args.logical_name,
        inputs,
        ResourceOptions::new(),
    )?;
    let fqdn = if args.relative_name == "@" {
        args.zone.domain_name.clone()
    } else {
        format!("{}.{}", args.relative_name, args.zone.domain_name)
    };
    Ok(RecordHandle { urn, fqdn })
}

/// Declares an A record.
///
/// # Errors
///
/// Returns an error if the record was already declared.
pub fn a_record(
    builder: &mut StackBuilder,
    args: RecordArgs<'_>,
    ipv4_address: Output<String>,
) -> Result<RecordHandle> {
    let address = ipv4_address.map(|ip| json!([{ "ipv4Address": ip }]));
    let inputs = record_inputs(&args, "A").set("properties.ARecords", address);
    register_record(builder, &args, inputs)
}

/// Declares a CNAME record.
///
/// # Errors
///
/// Returns an error if the record was already declared.
pub fn cname_record(
    builder: &mut StackBuilder,
    args: RecordArgs<'_>,
    target: Output<String>,
) -> Result<RecordHandle> {
    let cname = target.map(|cname| json!({ "cname": cname }));
    let inputs = record_inputs(&args, "CNAME").set("properties.CNAMERecord", cname);
    register_record(builder, &args, inputs)
}

/// Declares an MX record from ordered exchanger and preference pairs.
///
/// # Errors
///
/// Returns an error if the list is empty or the record was already
/// declared.
pub fn mx_record(
    builder: &mut StackBuilder,
    args: RecordArgs<'_>,
    exchanges: &[MailExchange],
) -> Result<RecordHandle> {
    if exchanges.is_empty() {
        return Err(GraphError::InvalidInput {
            resource: args.logical_name.to_string(),
            message: String::from("MX record needs at least one exchange"),
        }
        .into());
    }
    let records: Vec<Value> = exchanges
        .iter()
        .map(|mx| json!({ "exchange": mx.exchange, "preference": mx.preference }))
        .collect();
    let inputs = record_inputs(&args, "MX").set_value("properties.MXRecords", records);
    register_record(builder, &args, inputs)
}

/// Declares a TXT record.
///
/// # Errors
///
/// Returns an error if the value is invalid or the record was already
/// declared.
pub fn txt_record(
    builder: &mut StackBuilder,
    args: RecordArgs<'_>,
    value: impl Into<TxtValue>,
) -> Result<RecordHandle> {
    let segments = value.into().into_segments(args.logical_name)?;
    let records = segments.map(|segments| json!([{ "value": segments }]));
    let inputs = record_inputs(&args, "TXT").set("properties.TXTRecords", records);
    register_record(builder, &args, inputs)
}
