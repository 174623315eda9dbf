//! Certificate templates for issued leaves and bootstrapped roots

use rand::Rng;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, Ia5String, IsCa,
    KeyIdMethod, KeyUsagePurpose, PrintableString, SanType, SerialNumber,
};
use std::net::IpAddr;
use time::{Duration, OffsetDateTime};

use crate::error::{CertError, Result};

pub const ORGANIZATION: &str = "jmn.link";
pub const COUNTRY: &str = "CA";
pub const LOCALITY: &str = "Kingston";
pub const ORGANIZATIONAL_UNIT: &str = "IT";
pub const PROVINCE: &str = "Ontario";

/// Issued certificates are development certificates and are not meant to expire.
pub const VALIDITY_YEARS: i32 = 100;

/// Serial numbers are drawn uniformly from `[0, 2^61)`.
pub const SERIAL_LIMIT: u64 = 1 << 61;

/// Template for a non-CA certificate bound to the given identities.
///
/// DNS names and IP addresses keep the caller's order in the SAN extension.
pub fn leaf<D, I>(common_name: &str, dns_names: &[D], ip_addresses: &[I]) -> Result<CertificateParams>
where
    D: AsRef<str>,
    I: AsRef<str>,
{
    let mut sans = Vec::with_capacity(dns_names.len() + ip_addresses.len());

    for name in dns_names {
        let name = name.as_ref();
        let ia5 = Ia5String::try_from(name)
            .map_err(|_| CertError::Format(format!("Invalid DNS name '{}'", name)))?;
        sans.push(SanType::DnsName(ia5));
    }

    for ip in ip_addresses {
        let ip = ip.as_ref();
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| CertError::Format(format!("Invalid IP address '{}'", ip)))?;
        sans.push(SanType::IpAddress(addr));
    }

    let mut params = CertificateParams::default();
    params.distinguished_name = subject(common_name);
    params.subject_alt_names = sans;
    params.serial_number = Some(random_serial());
    params.is_ca = IsCa::NoCa;
    params.use_authority_key_identifier_extension = true;
    set_validity(&mut params, OffsetDateTime::now_utc())?;

    Ok(params)
}

/// Template for a self-signed root CA.
pub fn root(common_name: &str) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject(common_name);
    params.serial_number = Some(random_serial());
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];
    set_validity(&mut params, OffsetDateTime::now_utc())?;

    Ok(params)
}

/// Stand-in for a loaded issuer when signing a leaf.
///
/// Only the key identifier carries over into the leaf (as its Authority Key
/// Identifier). The issuer name written by the builder is replaced with the
/// issuer's encoded subject afterwards.
pub fn issuer(key_identifier: Option<Vec<u8>>) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    if let Some(id) = key_identifier {
        params.key_identifier_method = KeyIdMethod::PreSpecified(id);
    }
    params
}

/// Subject with the fixed organisational fields, in C, ST, L, O, OU, CN order.
fn subject(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, dn_value(COUNTRY));
    dn.push(DnType::StateOrProvinceName, dn_value(PROVINCE));
    dn.push(DnType::LocalityName, dn_value(LOCALITY));
    dn.push(DnType::OrganizationName, dn_value(ORGANIZATION));
    dn.push(DnType::OrganizationalUnitName, dn_value(ORGANIZATIONAL_UNIT));
    dn.push(DnType::CommonName, dn_value(common_name));
    dn
}

/// PrintableString when the value allows it, UTF8String otherwise.
fn dn_value(value: &str) -> DnValue {
    match PrintableString::try_from(value) {
        Ok(printable) => DnValue::PrintableString(printable),
        Err(_) => DnValue::Utf8String(value.to_string()),
    }
}

fn random_serial() -> SerialNumber {
    SerialNumber::from(rand::thread_rng().gen_range(0..SERIAL_LIMIT))
}

fn set_validity(params: &mut CertificateParams, now: OffsetDateTime) -> Result<()> {
    params.not_before = now;
    params.not_after = years_after(now, VALIDITY_YEARS)?;
    Ok(())
}

/// `start` moved forward by whole calendar years. Feb 29 becomes Mar 1 when
/// the target year has no leap day.
fn years_after(start: OffsetDateTime, years: i32) -> Result<OffsetDateTime> {
    let year = start.year() + years;
    start
        .replace_year(year)
        .or_else(|_| (start + Duration::days(1)).replace_year(year))
        .map_err(|e| CertError::Crypto(format!("Invalid validity period: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NONE: &[&str] = &[];

    #[test]
    fn test_leaf_keeps_san_order() {
        let params = leaf("test.com", &["b.com", "a.com"], &["::1", "10.0.0.1"]).unwrap();

        let expected = vec![
            SanType::DnsName(Ia5String::try_from("b.com").unwrap()),
            SanType::DnsName(Ia5String::try_from("a.com").unwrap()),
            SanType::IpAddress("::1".parse().unwrap()),
            SanType::IpAddress("10.0.0.1".parse().unwrap()),
        ];
        assert_eq!(params.subject_alt_names, expected);
        assert_eq!(params.is_ca, IsCa::NoCa);
    }

    #[test]
    fn test_leaf_rejects_bad_ip() {
        let err = leaf("test.com", NONE, &["1.2.3"]).unwrap_err();
        assert!(matches!(err, CertError::Format(ref m) if m.contains("1.2.3")));
    }

    #[test]
    fn test_leaf_rejects_non_ascii_dns_name() {
        let err = leaf("test.com", &["bücher.example"], NONE).unwrap_err();
        assert!(matches!(err, CertError::Format(_)));
    }

    #[test]
    fn test_validity_is_one_hundred_years() {
        let params = leaf("test.com", NONE, NONE).unwrap();

        assert_eq!(params.not_after.year(), params.not_before.year() + VALIDITY_YEARS);
        assert_eq!(params.not_after.month(), params.not_before.month());
        assert_eq!(params.not_after.day(), params.not_before.day());
    }

    #[test]
    fn test_leap_day_rolls_forward() {
        let start = datetime!(2096-02-29 12:00 UTC);
        assert_eq!(years_after(start, 100).unwrap(), datetime!(2196-02-29 12:00 UTC));

        let start = datetime!(2000-02-29 12:00 UTC);
        assert_eq!(years_after(start, 100).unwrap(), datetime!(2100-03-01 12:00 UTC));
    }

    #[test]
    fn test_root_is_a_ca() {
        let params = root("devcerts CA").unwrap();

        assert_eq!(params.is_ca, IsCa::Ca(BasicConstraints::Unconstrained));
        assert!(params.key_usages.contains(&KeyUsagePurpose::KeyCertSign));
    }

    #[test]
    fn test_issuer_carries_key_identifier() {
        let params = issuer(Some(vec![1, 2, 3]));
        assert!(matches!(params.key_identifier_method, KeyIdMethod::PreSpecified(ref id) if id == &[1, 2, 3]));
        assert_eq!(params.is_ca, IsCa::Ca(BasicConstraints::Unconstrained));
    }

    #[test]
    fn test_subject_uses_utf8_only_when_needed() {
        assert!(matches!(dn_value("test.com"), DnValue::PrintableString(_)));
        assert!(matches!(dn_value("*.test.com"), DnValue::Utf8String(_)));
    }
}
