//! Parameter-name declarations for one stream.

use std::collections::HashMap;

use crate::token::ParameterRecord;

use super::config::DeclarationMode;

/// Names the renderer knows without a `Declare`, with their declaration.
const STANDARD: &[(&str, &str)] = &[
    ("P", "vertex point"),
    ("Pz", "vertex float"),
    ("Pw", "vertex hpoint"),
    ("N", "varying normal"),
    ("Np", "uniform normal"),
    ("Cs", "varying color"),
    ("Os", "varying color"),
    ("s", "varying float"),
    ("t", "varying float"),
    ("st", "varying float[2]"),
    ("width", "varying float"),
    ("constantwidth", "constant float"),
    ("constantnormal", "constant normal"),
    ("intensity", "float"),
    ("lightcolor", "color"),
    ("from", "point"),
    ("to", "point"),
    ("coneangle", "float"),
    ("conedeltaangle", "float"),
    ("beamdistribution", "float"),
];

/// How a record's token is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    /// Token string placed in the parameter list.
    pub token: String,
    /// `Declare` to emit first, as `(name, declaration)`.
    pub declare: Option<(String, String)>,
}

/// Tracks which names were declared on the stream and with what.
#[derive(Debug, Clone)]
pub struct DeclarationTable {
    mode: DeclarationMode,
    standard: HashMap<&'static str, &'static str>,
    declared: HashMap<String, String>,
}

impl DeclarationTable {
    /// Fresh table for a new stream.
    pub fn new(mode: DeclarationMode) -> Self {
        Self {
            mode,
            standard: STANDARD.iter().copied().collect(),
            declared: HashMap::new(),
        }
    }

    /// Declaration currently bound to `name`, standard or declared.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.declared
            .get(name)
            .map(String::as_str)
            .or_else(|| self.standard.get(name).copied())
    }

    /// Record an explicit `Declare`.
    pub fn record(&mut self, name: &str, declaration: &str) {
        self.declared.insert(name.to_string(), declaration.to_string());
    }

    /// Decide the token for `rec`, registering a declaration when needed.
    ///
    /// Standard names used with their standard declaration stay plain; with
    /// any other declaration they are written inline, never redeclared.
    pub fn resolve(&mut self, rec: &ParameterRecord) -> ResolvedToken {
        let name = rec.name();
        let decl = rec.get_ri_declare();

        if let Some(standard) = self.standard.get(name) {
            let token = if *standard == decl {
                name.to_string()
            } else {
                rec.get_detailed_token_name()
            };
            return ResolvedToken { token, declare: None };
        }

        match self.mode {
            DeclarationMode::Inline => {
                ResolvedToken { token: rec.get_detailed_token_name(), declare: None }
            }
            DeclarationMode::Declare => {
                let declare = if self.declared.get(name) == Some(&decl) {
                    None
                } else {
                    self.declared.insert(name.to_string(), decl.clone());
                    Some((name.to_string(), decl))
                };
                ResolvedToken { token: name.to_string(), declare }
            }
        }
    }
}
