//! Built-in OS profiles for common network operating systems.
//!
//! Configuration files can override any of these by defining a profile
//! with the same name.

use super::definition::OsProfile;

/// Cisco IOS / IOS-XE.
pub fn cisco_ios() -> OsProfile {
    OsProfile::new("ios").with_disable_paging("terminal length 0")
}

/// Cisco NX-OS.
pub fn cisco_nxos() -> OsProfile {
    OsProfile::new("nxos")
        .with_disable_paging("terminal length 0")
        .with_disable_paging("terminal width 511")
}

/// Arista EOS.
pub fn arista_eos() -> OsProfile {
    OsProfile::new("eos").with_disable_paging("terminal length 0")
}

/// Juniper Junos.
///
/// ```text
/// admin@mx1>
/// ```
pub fn juniper_junos() -> OsProfile {
    OsProfile::new("junos")
        .with_disable_paging("set cli screen-length 0")
        .with_show_running("show configuration")
}

/// Nokia SR OS (classic CLI).
///
/// Classic prompts carry a leading `*` while there are unsaved changes, so
/// the prompt pattern allows it.
///
/// ```text
/// A:sr1#
/// *A:sr1#
/// ```
pub fn nokia_sros() -> OsProfile {
    OsProfile::new("sros")
        .with_disable_paging("environment no more")
        .with_show_running("admin display-config")
        .with_prompt_pattern(r"(?mi)^\r?(\*?[a-z0-9.\-_@()/:]{1,32}\s*[#>$])\s*$")
}

/// Every built-in profile.
pub fn all() -> Vec<OsProfile> {
    vec![
        OsProfile::default(),
        cisco_ios(),
        cisco_nxos(),
        arista_eos(),
        juniper_junos(),
        nokia_sros(),
    ]
}
