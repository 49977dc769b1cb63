//! Parsing of port and address selections such as `"3,5-7"` or `"all"`.

use std::{collections::BTreeSet, ops::RangeInclusive};

use crate::{
    error::{Error, Result},
    transport::UnitId,
};

/// Serial ports of the switch.
pub const SWITCH_PORTS: RangeInclusive<UnitId> = 1..=8;

/// Unit addresses usable on a downstream serial bus.
pub const DEVICE_ADDRESSES: RangeInclusive<UnitId> = 1..=247;

/// Parse a switch port selection.
///
/// An absent or blank `spec` selects every port when `default_all` is set and is
/// rejected otherwise; commands that modify ports must pass `false`.
pub fn parse_ports(spec: Option<&str>, default_all: bool) -> Result<Vec<UnitId>> {
    parse_selection(spec, SWITCH_PORTS, default_all)
}

/// Parse a comma separated list of numbers and `lo-hi` ranges within `domain`.
///
/// The result is sorted and free of duplicates.
pub fn parse_selection(
    spec: Option<&str>,
    domain: RangeInclusive<UnitId>,
    default_all: bool,
) -> Result<Vec<UnitId>> {
    let spec = spec.map(str::trim).unwrap_or_default();
    if spec.is_empty() {
        return if default_all {
            Ok(domain.collect())
        } else {
            Err(Error::InvalidPortSpec("no ports selected".into()))
        };
    }

    let mut selected = BTreeSet::new();
    for token in spec.split(',').map(str::trim) {
        if token.eq_ignore_ascii_case("all") {
            selected.extend(domain.clone());
            continue;
        }
        let range = match token.split_once('-') {
            Some((lo, hi)) => parse_number(lo, &domain)?..=parse_number(hi, &domain)?,
            None => {
                let n = parse_number(token, &domain)?;
                n..=n
            }
        };
        if range.is_empty() {
            return Err(Error::InvalidPortSpec(format!("descending range {token:?}")));
        }
        selected.extend(range);
    }

    Ok(selected.into_iter().collect())
}

fn parse_number(token: &str, domain: &RangeInclusive<UnitId>) -> Result<UnitId> {
    let n = token
        .trim()
        .parse::<UnitId>()
        .map_err(|_| Error::InvalidPortSpec(format!("{token:?} is not a number")))?;
    if !domain.contains(&n) {
        return Err(Error::InvalidPortSpec(format!(
            "{n} is outside {}-{}",
            domain.start(),
            domain.end()
        )));
    }
    Ok(n)
}
