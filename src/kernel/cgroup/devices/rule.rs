/// Device cgroup rules and their line-oriented text form
use crate::config::types::{Result, RuntimeError};
use crate::consumer::{ConsumeError, FuzzInput, Generate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device node type a rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// `a`: every device
    All,
    /// `b`
    Block,
    /// `c`
    Char,
}

impl DeviceType {
    pub fn as_char(self) -> char {
        match self {
            DeviceType::All => 'a',
            DeviceType::Block => 'b',
            DeviceType::Char => 'c',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'a' => Some(DeviceType::All),
            'b' => Some(DeviceType::Block),
            'c' => Some(DeviceType::Char),
            _ => None,
        }
    }
}

crate::generate_choice!(DeviceType {
    DeviceType::All,
    DeviceType::Block,
    DeviceType::Char,
});

/// Access bits: read, write, mknod.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions(u8);

impl Permissions {
    pub const READ: Permissions = Permissions(1);
    pub const WRITE: Permissions = Permissions(2);
    pub const MKNOD: Permissions = Permissions(4);

    pub const fn empty() -> Self {
        Permissions(0)
    }

    pub const fn all() -> Self {
        Permissions(7)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: Permissions) -> Permissions {
        Permissions(self.0 | other.0)
    }

    pub fn difference(self, other: Permissions) -> Permissions {
        Permissions(self.0 & !other.0)
    }

    pub fn intersection(self, other: Permissions) -> Permissions {
        Permissions(self.0 & other.0)
    }

    pub fn contains(self, other: Permissions) -> bool {
        self.intersection(other) == other
    }
}

impl FromStr for Permissions {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 3 {
            return Err(RuntimeError::Device(format!("invalid permissions {s:?}")));
        }
        let mut perms = Permissions::empty();
        for c in s.chars() {
            perms = perms.union(match c {
                'r' => Permissions::READ,
                'w' => Permissions::WRITE,
                'm' => Permissions::MKNOD,
                _ => {
                    return Err(RuntimeError::Device(format!(
                        "invalid permission {c:?} in {s:?}"
                    )))
                }
            });
        }
        Ok(perms)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, c) in [
            (Permissions::READ, 'r'),
            (Permissions::WRITE, 'w'),
            (Permissions::MKNOD, 'm'),
        ] {
            if self.contains(bit) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl Generate for Permissions {
    fn generate(input: &mut FuzzInput<'_>) -> std::result::Result<Self, ConsumeError> {
        Ok(Permissions(input.get_u8()? & 7))
    }
}

/// Device selector: type plus major/minor, `None` meaning `*`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceSelector {
    pub kind: DeviceType,
    pub major: Option<u32>,
    pub minor: Option<u32>,
}

impl DeviceSelector {
    pub fn is_wildcard_type(&self) -> bool {
        self.kind == DeviceType::All
    }
}

fn fmt_number(n: Option<u32>) -> String {
    n.map_or_else(|| "*".to_string(), |n| n.to_string())
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}",
            self.kind.as_char(),
            fmt_number(self.major),
            fmt_number(self.minor)
        )
    }
}

/// A single allow or deny device rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub selector: DeviceSelector,
    pub permissions: Permissions,
    pub allow: bool,
}

impl Rule {
    /// `a *:* rwm` with the given verdict.
    pub fn blanket(allow: bool) -> Self {
        Rule {
            selector: DeviceSelector {
                kind: DeviceType::All,
                major: None,
                minor: None,
            },
            permissions: Permissions::all(),
            allow,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allow { "allow" } else { "deny" };
        write!(f, "{} {} {}", verdict, self.selector, self.permissions)
    }
}

fn parse_number(s: &str, line: &str) -> Result<Option<u32>> {
    if s == "*" {
        return Ok(None);
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RuntimeError::Device(format!(
            "invalid device number {s:?} in line {line:?}"
        )));
    }
    s.parse::<u32>()
        .map(Some)
        .map_err(|e| RuntimeError::Device(format!("device number {s:?} out of range: {e}")))
}

/// Parse `[allow |deny ]TYPE MAJOR:MINOR PERMS`. Lines without a verdict are
/// allow rules, which is the format of a cgroup `devices.list` file.
impl FromStr for Rule {
    type Err = RuntimeError;

    fn from_str(line: &str) -> Result<Self> {
        let (allow, body) = if let Some(rest) = line.strip_prefix("allow ") {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix("deny ") {
            (false, rest)
        } else {
            (true, line)
        };

        let parts: Vec<&str> = body.split(' ').collect();
        if parts.len() != 3 {
            return Err(RuntimeError::Device(format!(
                "expected 'TYPE MAJOR:MINOR PERMS', got {line:?}"
            )));
        }

        let mut type_chars = parts[0].chars();
        let kind = match (type_chars.next(), type_chars.next()) {
            (Some(c), None) => DeviceType::from_char(c),
            _ => None,
        }
        .ok_or_else(|| RuntimeError::Device(format!("invalid device type in line {line:?}")))?;

        let (major, minor) = parts[1].split_once(':').ok_or_else(|| {
            RuntimeError::Device(format!("missing ':' between major and minor in {line:?}"))
        })?;
        let major = parse_number(major, line)?;
        let minor = parse_number(minor, line)?;

        if kind == DeviceType::All && (major.is_some() || minor.is_some()) {
            return Err(RuntimeError::Device(format!(
                "type 'a' only accepts *:*, got {line:?}"
            )));
        }

        let permissions = parts[2].parse::<Permissions>()?;

        Ok(Rule {
            selector: DeviceSelector { kind, major, minor },
            permissions,
            allow,
        })
    }
}

impl Generate for Rule {
    fn generate(input: &mut FuzzInput<'_>) -> std::result::Result<Self, ConsumeError> {
        let kind = DeviceType::generate(input)?;
        let (major, minor) = if kind == DeviceType::All {
            (None, None)
        } else {
            (Option::<u32>::generate(input)?, Option::<u32>::generate(input)?)
        };
        Ok(Rule {
            selector: DeviceSelector { kind, major, minor },
            permissions: Permissions::generate(input)?,
            allow: input.get_bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices_list_line() {
        let rule: Rule = "c 1:3 rwm".parse().unwrap();
        assert!(rule.allow);
        assert_eq!(rule.selector.kind, DeviceType::Char);
        assert_eq!(rule.selector.major, Some(1));
        assert_eq!(rule.selector.minor, Some(3));
        assert_eq!(rule.permissions, Permissions::all());
    }

    #[test]
    fn test_parse_deny_wildcard() {
        let rule: Rule = "deny b *:* r".parse().unwrap();
        assert!(!rule.allow);
        assert_eq!(rule.selector.major, None);
        assert_eq!(rule.selector.minor, None);
        assert_eq!(rule.permissions, Permissions::READ);
    }

    #[test]
    fn test_display_round_trip() {
        let rule: Rule = "deny c 10:* mw".parse().unwrap();
        assert_eq!(rule.to_string(), "deny c 10:* wm");
        assert_eq!(rule.to_string().parse::<Rule>().unwrap(), rule);
    }

    #[test]
    fn test_rejects_malformed_lines() {
        for line in [
            "",
            "x 1:2 r",
            "c 1 r",
            "c 1:2",
            "c 1:2 q",
            "c 1:2 rwmr",
            "c -1:2 r",
            "c 99999999999:1 r",
            "a 1:2 rwm",
            "cc 1:2 r",
            "allow  c 1:2 r",
        ] {
            assert!(line.parse::<Rule>().is_err(), "accepted {line:?}");
        }
    }

    #[test]
    fn test_permission_algebra() {
        let rw: Permissions = "rw".parse().unwrap();
        let wm: Permissions = "wm".parse().unwrap();
        assert_eq!(rw.difference(wm), Permissions::READ);
        assert_eq!(rw.intersection(wm), Permissions::WRITE);
        assert_eq!(rw.union(wm), Permissions::all());
        assert!(Permissions::empty().is_empty());
    }
}
