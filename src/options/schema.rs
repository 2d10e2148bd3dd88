use std::collections::BTreeMap;

use bytes::Bytes;

use super::Group;
use super::Options;
use super::StagedConfig;
use super::Value;
use crate::Key;
use crate::Result;
use crate::ValidationError;

/// Type a scalar's raw value is coerced to on apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Int,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Single value at `<root>/<name>`
    Scalar(ValueKind),
    /// Open-ended collection at `<root>/<name>/<member>`
    Group,
}

/// Declaration of one configuration option.
///
/// ```ignore
/// let rule = ConfigRule::scalar("config-version").int().default("0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRule {
    pub name: String,
    pub kind: RuleKind,
    pub default: Option<String>,
    pub required: bool,
    pub help: String,
}

impl ConfigRule {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RuleKind::Scalar(ValueKind::String),
            default: None,
            required: false,
            help: String::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RuleKind::Group,
            default: None,
            required: false,
            help: String::new(),
        }
    }

    pub fn int(mut self) -> Self {
        self.kind = RuleKind::Scalar(ValueKind::Int);
        self
    }

    pub fn bool(mut self) -> Self {
        self.kind = RuleKind::Scalar(ValueKind::Bool);
        self
    }

    /// Raw value used while the store holds none; ignored for groups.
    pub fn default(
        mut self,
        value: impl Into<String>,
    ) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn help(
        mut self,
        text: impl Into<String>,
    ) -> Self {
        self.help = text.into();
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind == RuleKind::Group
    }

    /// Key this option is read from: a scalar slot, or a group prefix for `list`.
    pub fn key(&self) -> Key {
        match self.kind {
            RuleKind::Scalar(_) => Key::scalar(self.name.clone()),
            RuleKind::Group => Key::prefix(self.name.clone()),
        }
    }
}

/// Ordered set of declared options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    rules: Vec<ConfigRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, replacing an earlier rule with the same name.
    pub fn rule(
        mut self,
        rule: ConfigRule,
    ) -> Self {
        self.rules.retain(|r| r.name != rule.name);
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ConfigRule] {
        &self.rules
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&ConfigRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Whether `key` addresses a declared slot: a declared scalar by name, or a member
    /// of a declared group.
    pub fn is_declared(
        &self,
        key: &Key,
    ) -> bool {
        let (name, want_group) = if key.is_scalar() {
            (key.name.as_str(), false)
        } else {
            (key.group.as_str(), true)
        };
        self.get(name).is_some_and(|r| r.is_group() == want_group)
    }

    /// Validates staged values into a typed snapshot.
    ///
    /// Scalars absent from `staged` take their default. Values for undeclared slots are
    /// carried in the raw copy but never surface as options.
    pub fn apply(
        &self,
        staged: &StagedConfig,
    ) -> Result<Options> {
        let mut values = BTreeMap::new();
        let mut groups = BTreeMap::new();

        for rule in &self.rules {
            match rule.kind {
                RuleKind::Scalar(kind) => {
                    let raw = staged
                        .scalar(&rule.name)
                        .cloned()
                        .or_else(|| rule.default.clone().map(Bytes::from));
                    match raw {
                        Some(raw) => {
                            values.insert(rule.name.clone(), coerce(&rule.name, kind, &raw)?);
                        }
                        None if rule.required => {
                            return Err(ValidationError::Required(rule.name.clone()).into());
                        }
                        None => {}
                    }
                }
                RuleKind::Group => {
                    let mut members = BTreeMap::new();
                    for (member, raw) in staged.group(&rule.name).into_iter().flatten() {
                        let text = utf8(&format!("{}/{}", rule.name, member), raw)?;
                        members.insert(member.clone(), text.to_string());
                    }
                    if members.is_empty() && rule.required {
                        return Err(ValidationError::Required(rule.name.clone()).into());
                    }
                    groups.insert(rule.name.clone(), Group::from(members));
                }
            }
        }

        Ok(Options::new(values, groups, staged.clone()))
    }
}

fn utf8<'a>(
    name: &str,
    raw: &'a [u8],
) -> Result<&'a str> {
    std::str::from_utf8(raw).map_err(|_| {
        ValidationError::InvalidUtf8 {
            name: name.to_string(),
        }
        .into()
    })
}

fn coerce(
    name: &str,
    kind: ValueKind,
    raw: &[u8],
) -> Result<Value> {
    let text = utf8(name, raw)?;
    match kind {
        ValueKind::String => Ok(Value::Str(text.to_string())),
        ValueKind::Int => text.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            ValidationError::InvalidInt {
                name: name.to_string(),
                value: text.to_string(),
            }
            .into()
        }),
        ValueKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(ValidationError::InvalidBool {
                name: name.to_string(),
                value: text.to_string(),
            }
            .into()),
        },
    }
}
