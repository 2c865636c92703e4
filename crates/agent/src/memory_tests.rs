// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::FixtureMemory;

#[test]
fn protection_parse_accepts_padded_and_compact_forms() {
    let p = Protection::parse("rw-");
    assert!(p.read && p.write && !p.execute);
    assert_eq!(Protection::parse("rx"), Protection::parse("r-x"));
    assert_eq!(Protection::parse("---"), Protection::default());
}

#[test]
fn protection_display_is_padded() {
    assert_eq!(Protection::parse("rw").to_string(), "rw-");
    assert_eq!(Protection::parse("x").to_string(), "--x");
}

#[test]
fn satisfies_requires_all_wanted_flags() {
    let rwx = Protection::parse("rwx");
    let rw = Protection::parse("rw-");
    let r = Protection::parse("r--");
    assert!(rwx.satisfies(rw));
    assert!(rw.satisfies(r));
    assert!(!r.satisfies(rw));
    // An empty filter matches everything.
    assert!(r.satisfies(Protection::default()));
}

#[test]
fn fixture_read_write_round_trip() -> anyhow::Result<()> {
    let mem = FixtureMemory::new().with_region(0x1000, 64, "rw-");
    mem.write(0x1010, &[1, 2, 3])?;
    assert_eq!(mem.read(0x1010, 3)?.to_vec(), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn fixture_rejects_unmapped_access() {
    let mem = FixtureMemory::new().with_region(0x1000, 16, "rw-");
    assert!(mem.read(0x2000, 1).is_err());
    // Read straddling the end of the region is out of bounds.
    assert!(mem.read(0x100f, 2).is_err());
    assert!(mem.write(0x0, &[0]).is_err());
}

#[test]
fn ranges_filter_by_protection() {
    let mem = FixtureMemory::new()
        .with_region(0x1000, 16, "rw-")
        .with_region(0x2000, 16, "r-x");
    let writable = mem.ranges(Protection::parse("w"));
    assert_eq!(writable.len(), 1);
    assert_eq!(writable[0].base, 0x1000);
    let all = mem.ranges(Protection::default());
    assert_eq!(all.len(), 2);
}

#[test]
fn sample_fixture_exposes_modules_and_exports() {
    let mem = FixtureMemory::sample();
    let modules = mem.modules();
    assert!(modules.iter().any(|m| m.name == "target-app"));
    let exports = mem.exports("target-app");
    assert!(exports.iter().any(|e| e.name == "main"));
    assert!(mem.exports("nope").is_empty());
}
