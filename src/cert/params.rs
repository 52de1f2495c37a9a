use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::asn1::{PrintableStringRef, SetOfVec};
use der::{Any, Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};

/// Distinguished name of a certificate subject or issuer.
///
/// Every attribute is optional and free-form. Two names are equal, and hash
/// equally, exactly when all six attributes are equal (absent equals absent).
///
/// An empty attribute is never encoded, so `organization("")` reads back from
/// a certificate as absent. Callers that need the round trip to be exact
/// should leave such attributes unset.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `locality` - The locality or city (L).
/// * `state` - The state or province (ST).
/// * `country` - The country (C).
/// * `organization` - The organization (O).
/// * `organizational_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Builder)]
pub struct DistinguishedName {
    #[builder(into)]
    common_name: Option<String>,
    #[builder(into)]
    locality: Option<String>,
    #[builder(into)]
    state: Option<String>,
    #[builder(into)]
    country: Option<String>,
    #[builder(into)]
    organization: Option<String>,
    #[builder(into)]
    organizational_unit: Option<String>,
}

impl DistinguishedName {
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn organizational_unit(&self) -> Option<&str> {
        self.organizational_unit.as_deref()
    }

    /// Attributes in encoding order.
    ///
    /// `RdnSequence` renders its RDNs last-to-first, so inserting OU first and
    /// CN last makes the rendered name start with the common name:
    /// `CN=..,L=..,ST=..,C=..,O=..,OU=..`.
    fn encoding_order(&self) -> [(ObjectIdentifier, Option<&str>); 6] {
        [
            (rfc4519::OU, self.organizational_unit()),
            (rfc4519::O, self.organization()),
            (rfc4519::C, self.country()),
            (rfc4519::ST, self.state()),
            (rfc4519::L, self.locality()),
            (rfc4519::CN, self.common_name()),
        ]
    }

    /// Converts the distinguished name to an X.509 name.
    ///
    /// Absent and empty attributes are skipped.
    pub fn as_x509_name(&self) -> Result<Name> {
        let mut rdns = Vec::with_capacity(6);
        for (oid, value) in self.encoding_order() {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let attribute = AttributeTypeAndValue {
                oid,
                value: attribute_value(oid, value)?,
            };
            let set = SetOfVec::try_from(vec![attribute]).map_err(|e| {
                CaError::certificate_build("failed to build relative distinguished name", e)
            })?;
            rdns.push(RelativeDistinguishedName(set));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes other than the six modelled here are ignored; when an
    /// attribute repeats, the one rendered first wins.
    pub fn from_x509_name(name: &Name) -> Self {
        let mut dn = DistinguishedName::default();
        for rdn in name.0.iter().rev() {
            for attr in rdn.0.iter() {
                let Some(value) = decode_attribute_value(&attr.value) else {
                    continue;
                };
                let slot = if attr.oid == rfc4519::CN {
                    &mut dn.common_name
                } else if attr.oid == rfc4519::L {
                    &mut dn.locality
                } else if attr.oid == rfc4519::ST {
                    &mut dn.state
                } else if attr.oid == rfc4519::C {
                    &mut dn.country
                } else if attr.oid == rfc4519::O {
                    &mut dn.organization
                } else if attr.oid == rfc4519::OU {
                    &mut dn.organizational_unit
                } else {
                    continue;
                };
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
        }
        dn
    }
}

impl fmt::Display for DistinguishedName {
    /// RFC 4514 rendering, common name first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_x509_name() {
            Ok(name) => write!(f, "{name}"),
            Err(_) => Err(fmt::Error),
        }
    }
}

// Country is a PrintableString in X.520; everything else, and any country
// value PrintableString can't carry, goes out as UTF8String.
fn attribute_value(oid: ObjectIdentifier, value: &str) -> Result<Any> {
    let tag = if oid == rfc4519::C && PrintableStringRef::new(value).is_ok() {
        Tag::PrintableString
    } else {
        Tag::Utf8String
    };
    Any::new(tag, value.as_bytes())
        .map_err(|e| CaError::certificate_build("failed to encode name attribute", e))
}

fn decode_attribute_value(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(value.value()).ok().map(str::to_owned)
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting at `start` for the given number of days.
    pub fn starting_at(start: OffsetDateTime, days: i64) -> Self {
        Self {
            not_before: start,
            not_after: start + Duration::days(days),
        }
    }

    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        Self::starting_at(OffsetDateTime::now_utc(), days)
    }

    /// Whether `instant` lies inside the window, bounds included.
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        let value = extension.to_x509_extension_value()?;
        Ok(Self {
            oid: E::OID,
            critical,
            value,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use der::{Decode, Encode};

    use super::*;

    fn full_name() -> DistinguishedName {
        DistinguishedName::builder()
            .common_name("New CN")
            .locality("Some Crater")
            .state("Dark Side")
            .country("The Moon")
            .organization("NASA")
            .organizational_unit("Apollo")
            .build()
    }

    fn hash_of(dn: &DistinguishedName) -> u64 {
        let mut hasher = DefaultHasher::new();
        dn.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_builder_sets_every_attribute() {
        let dn = full_name();
        assert_eq!(dn.common_name(), Some("New CN"));
        assert_eq!(dn.locality(), Some("Some Crater"));
        assert_eq!(dn.state(), Some("Dark Side"));
        assert_eq!(dn.country(), Some("The Moon"));
        assert_eq!(dn.organization(), Some("NASA"));
        assert_eq!(dn.organizational_unit(), Some("Apollo"));
    }

    #[test]
    fn test_every_attribute_subset_reads_back() {
        let values = ["cn", "l", "st", "c", "o", "ou"];
        for mask in 0u8..64 {
            let pick = |i: usize| (mask & (1 << i) != 0).then(|| values[i].to_string());
            let dn = DistinguishedName::builder()
                .maybe_common_name(pick(0))
                .maybe_locality(pick(1))
                .maybe_state(pick(2))
                .maybe_country(pick(3))
                .maybe_organization(pick(4))
                .maybe_organizational_unit(pick(5))
                .build();

            let read = [
                dn.common_name(),
                dn.locality(),
                dn.state(),
                dn.country(),
                dn.organization(),
                dn.organizational_unit(),
            ];
            for (i, value) in read.iter().enumerate() {
                assert_eq!(*value, pick(i).as_deref(), "mask {mask:#08b} attribute {i}");
            }

            let reparsed = DistinguishedName::from_x509_name(&dn.as_x509_name().unwrap());
            assert_eq!(reparsed, dn, "mask {mask:#08b}");
        }
    }

    #[test]
    fn test_all_fields_are_optional() {
        let dn = DistinguishedName::builder().build();
        assert_eq!(dn, DistinguishedName::default());
        assert!(dn.as_x509_name().unwrap().0.is_empty());
    }

    #[test]
    fn test_equal_names_hash_equal() {
        let this = full_name();
        let that = full_name();
        assert_eq!(this, that);
        assert_eq!(hash_of(&this), hash_of(&that));
    }

    #[test]
    fn test_one_character_difference_breaks_equality() {
        let this = full_name();
        let variants = [
            DistinguishedName {
                common_name: Some("New CM".into()),
                ..full_name()
            },
            DistinguishedName {
                locality: Some("Some Crates".into()),
                ..full_name()
            },
            DistinguishedName {
                state: Some("Dark Sida".into()),
                ..full_name()
            },
            DistinguishedName {
                country: Some("The Mooo".into()),
                ..full_name()
            },
            DistinguishedName {
                organization: Some("NASB".into()),
                ..full_name()
            },
            DistinguishedName {
                organizational_unit: Some("Apollp".into()),
                ..full_name()
            },
        ];
        for that in variants {
            assert_ne!(this, that);
            assert_ne!(hash_of(&this), hash_of(&that));
        }
    }

    #[test]
    fn test_absent_differs_from_present() {
        let this = full_name();
        let that = DistinguishedName {
            organizational_unit: None,
            ..full_name()
        };
        assert_ne!(this, that);
    }

    #[test]
    fn test_rdn_order_renders_common_name_first() {
        let dn = DistinguishedName::builder()
            .common_name("test-cn")
            .locality("Sydney")
            .state("NSW")
            .country("AU")
            .organization("MajaTech")
            .organizational_unit("CA")
            .build();

        let der = dn.as_x509_name().unwrap().to_der().unwrap();
        let parsed = Name::from_der(&der).unwrap();

        let rendered: Vec<ObjectIdentifier> =
            parsed.0.iter().rev().map(|rdn| rdn.0.get(0).unwrap().oid).collect();
        assert_eq!(
            rendered,
            vec![
                rfc4519::CN,
                rfc4519::L,
                rfc4519::ST,
                rfc4519::C,
                rfc4519::O,
                rfc4519::OU
            ]
        );
        assert_eq!(
            parsed.to_string(),
            "CN=test-cn,L=Sydney,ST=NSW,C=AU,O=MajaTech,OU=CA"
        );
        assert_eq!(DistinguishedName::from_x509_name(&parsed), dn);
    }

    #[test]
    fn test_empty_attribute_is_skipped() {
        let dn = DistinguishedName::builder()
            .common_name("only-cn")
            .organization("")
            .build();
        assert_eq!(dn.to_string(), "CN=only-cn");
    }

    #[test]
    fn test_validity_window() {
        let start = OffsetDateTime::now_utc();
        let validity = Validity::starting_at(start, 365);
        assert_eq!(validity.not_after - validity.not_before, Duration::days(365));
        assert!(validity.contains(start));
        assert!(!validity.contains(start - Duration::seconds(1)));
    }
}
