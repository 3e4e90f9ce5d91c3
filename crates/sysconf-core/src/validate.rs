//! Validator
//!
//! Pure checks run on every proposed leaf value before any external call.
//! Nothing in here touches the system; the zone database is only queried
//! for membership.

use crate::error::{ValidationError, ValidationReason};
use crate::model::{LeafPath, ResolverOptions, TaggedAddress};
use crate::traits::ZoneDatabase;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Maximum hostname / domain name length
pub const HOSTNAME_MAX_LEN: usize = 253;

/// Maximum length of a single label
const LABEL_MAX_LEN: usize = 63;

/// Accepted UTC offset range in minutes (`Etc/GMT+12` .. `Etc/GMT-14`)
const UTC_OFFSET_MIN: i64 = -12 * 60;
const UTC_OFFSET_MAX: i64 = 14 * 60;

/// Check a hostname against the RFC 952/1123 grammar
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    check_domain_grammar(hostname).map_err(|_| {
        ValidationError::new(
            LeafPath::Hostname.as_str(),
            hostname,
            ValidationReason::InvalidHostname,
        )
    })
}

/// Check a search domain against the same grammar as hostnames
pub fn validate_search_domain(domain: &str) -> Result<(), ValidationError> {
    check_domain_grammar(domain).map_err(|_| {
        ValidationError::new(
            LeafPath::DnsSearch.as_str(),
            domain,
            ValidationReason::InvalidDomain,
        )
    })
}

fn check_domain_grammar(name: &str) -> Result<(), ()> {
    if name.is_empty() || name.len() > HOSTNAME_MAX_LEN {
        return Err(());
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > LABEL_MAX_LEN {
            return Err(());
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(());
        }
    }

    Ok(())
}

/// Check that a zone name is recognized by the zone database
///
/// Names are also checked syntactically first so that nothing resembling a
/// path escape ever reaches the database lookup.
pub fn validate_timezone_name(
    zone: &str,
    zones: &dyn ZoneDatabase,
) -> Result<(), ValidationError> {
    let unknown = || {
        ValidationError::new(
            LeafPath::TimezoneName.as_str(),
            zone,
            ValidationReason::UnknownTimezone,
        )
    };

    if !is_zone_name_syntax(zone) {
        return Err(unknown());
    }
    if !zones.contains(zone) {
        return Err(unknown());
    }
    Ok(())
}

fn is_zone_name_syntax(zone: &str) -> bool {
    !zone.is_empty()
        && !zone.starts_with('/')
        && zone.split('/').all(|part| {
            !part.is_empty()
                && part != "."
                && part != ".."
                && part
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'+' | b'.'))
        })
}

/// Parse an address as IPv4 dotted-quad or IPv6 colon-form
pub fn validate_address(address: &str) -> Result<TaggedAddress, ValidationError> {
    if let Ok(v4) = address.parse::<Ipv4Addr>() {
        return Ok(TaggedAddress::from(std::net::IpAddr::V4(v4)));
    }
    if let Ok(v6) = address.parse::<Ipv6Addr>() {
        return Ok(TaggedAddress::from(std::net::IpAddr::V6(v6)));
    }
    Err(ValidationError::new(
        LeafPath::DnsServer.as_str(),
        address,
        ValidationReason::InvalidAddress,
    ))
}

/// Map a UTC offset onto the zone that represents it
///
/// Only whole-hour offsets have an `Etc/GMT` zone; note the inverted sign
/// of the POSIX names (UTC+2 is `Etc/GMT-2`).
pub fn validate_utc_offset(
    minutes: i64,
    zones: &dyn ZoneDatabase,
) -> Result<String, ValidationError> {
    let invalid = || {
        ValidationError::new(
            LeafPath::TimezoneUtcOffset.as_str(),
            minutes.to_string(),
            ValidationReason::InvalidUtcOffset,
        )
    };

    if !(UTC_OFFSET_MIN..=UTC_OFFSET_MAX).contains(&minutes) || minutes % 60 != 0 {
        return Err(invalid());
    }

    let zone = offset_zone_name(minutes);
    if !zones.contains(&zone) {
        return Err(invalid());
    }
    Ok(zone)
}

/// `Etc/GMT±H` name for a whole-hour offset
pub fn offset_zone_name(minutes: i64) -> String {
    let hours = minutes / 60;
    match hours {
        0 => "Etc/UTC".to_string(),
        h if h > 0 => format!("Etc/GMT-{h}"),
        h => format!("Etc/GMT+{}", -h),
    }
}

/// Range-check resolver tuning knobs
pub fn validate_resolver_options(options: &ResolverOptions) -> Result<(), ValidationError> {
    if !(1..=60).contains(&options.timeout_secs) {
        return Err(ValidationError::new(
            LeafPath::DnsOptionsTimeout.as_str(),
            options.timeout_secs.to_string(),
            ValidationReason::OutOfRange,
        ));
    }
    if !(1..=10).contains(&options.attempts) {
        return Err(ValidationError::new(
            LeafPath::DnsOptionsAttempts.as_str(),
            options.attempts.to_string(),
            ValidationReason::OutOfRange,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AddressFamily;
    use std::collections::HashSet;

    struct Zones(HashSet<&'static str>);

    impl ZoneDatabase for Zones {
        fn contains(&self, zone: &str) -> bool {
            self.0.contains(zone)
        }
    }

    fn zones() -> Zones {
        Zones(
            ["Europe/Berlin", "Etc/UTC", "Etc/GMT-2", "Etc/GMT+5"]
                .into_iter()
                .collect(),
        )
    }

    #[test]
    fn accepts_grammatical_hostnames() {
        for h in ["testhost", "testing.local", "another.test.com", "example.host.test", "h1-a.b2"] {
            assert!(validate_hostname(h).is_ok(), "{h} should be valid");
        }
        assert!(validate_hostname(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_bad_hostnames() {
        let too_long = vec!["abcdefghi"; 26].join(".");
        assert!(too_long.len() > HOSTNAME_MAX_LEN);

        for h in ["", "-lead", "trail-", "a..b", "under_score", "sp ace", "a.", too_long.as_str()] {
            let err = validate_hostname(h).unwrap_err();
            assert_eq!(err.reason, ValidationReason::InvalidHostname, "{h:?}");
            assert_eq!(err.leaf, "system/hostname");
        }
        assert!(validate_hostname(&"a".repeat(64)).is_err());
    }

    #[test]
    fn timezone_must_exist_in_database() {
        let db = zones();
        assert!(validate_timezone_name("Europe/Berlin", &db).is_ok());

        let err = validate_timezone_name("Europe/Silverstone", &db).unwrap_err();
        assert_eq!(err.reason, ValidationReason::UnknownTimezone);
        assert_eq!(err.value, "Europe/Silverstone");
    }

    #[test]
    fn timezone_syntax_blocks_path_escapes() {
        struct Everything;
        impl ZoneDatabase for Everything {
            fn contains(&self, _zone: &str) -> bool {
                true
            }
        }

        for z in ["", "/etc/passwd", "../../etc/passwd", "Europe//Berlin", "Europe/./Berlin"] {
            assert!(validate_timezone_name(z, &Everything).is_err(), "{z:?}");
        }
    }

    #[test]
    fn addresses_are_family_tagged() {
        let v4 = validate_address("10.10.10.10").unwrap();
        assert_eq!(v4.family, AddressFamily::Ipv4);
        assert_eq!(v4.raw, vec![10, 10, 10, 10]);

        let v6 = validate_address("2001:db8:1::ab9:c0a8:102").unwrap();
        assert_eq!(v6.family, AddressFamily::Ipv6);
        assert_eq!(v6.raw.len(), 16);
        assert_eq!(&v6.raw[..4], &[0x20, 0x01, 0x0d, 0xb8]);

        for bad in ["", "1.2.3", "1.2.3.256", "dns.example.com", "2001:db8::g"] {
            let err = validate_address(bad).unwrap_err();
            assert_eq!(err.reason, ValidationReason::InvalidAddress, "{bad:?}");
        }
    }

    #[test]
    fn utc_offsets_map_to_inverted_etc_zones() {
        let db = zones();
        assert_eq!(validate_utc_offset(120, &db).unwrap(), "Etc/GMT-2");
        assert_eq!(validate_utc_offset(-300, &db).unwrap(), "Etc/GMT+5");
        assert_eq!(validate_utc_offset(0, &db).unwrap(), "Etc/UTC");

        for bad in [90, 15 * 60, -13 * 60] {
            let err = validate_utc_offset(bad, &db).unwrap_err();
            assert_eq!(err.reason, ValidationReason::InvalidUtcOffset);
        }
        // representable, but missing from this database
        assert!(validate_utc_offset(60, &db).is_err());
    }

    #[test]
    fn resolver_option_ranges() {
        assert!(validate_resolver_options(&ResolverOptions::default()).is_ok());

        let err = validate_resolver_options(&ResolverOptions {
            timeout_secs: 0,
            attempts: 2,
        })
        .unwrap_err();
        assert_eq!(err.leaf, "system/dns-resolver/options/timeout");

        let err = validate_resolver_options(&ResolverOptions {
            timeout_secs: 5,
            attempts: 11,
        })
        .unwrap_err();
        assert_eq!(err.reason, ValidationReason::OutOfRange);
    }

    #[test]
    fn search_domains_use_domain_reason() {
        assert!(validate_search_domain("testsrv").is_ok());
        let err = validate_search_domain("bad..domain").unwrap_err();
        assert_eq!(err.reason, ValidationReason::InvalidDomain);
        assert_eq!(err.leaf, "system/dns-resolver/search");
    }
}
