//! Input contract with the front-end.
//!
//! The front-end discovers annotated declarations and hands the engine one
//! [`Declarations`] document: the graph hierarchy plus every binding
//! declaration. The JSON shape mirrors these structs (camelCase field
//! names, type references written as strings).

use knit_common::{DeclarationSite, ResolverOptions};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::binding::{ContributionKind, Indirection};
use crate::key::{BindingKey, Qualifier, TypeParseError, TypeRef};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declarations {
    #[serde(default)]
    pub options: ResolverOptions,
    #[serde(default)]
    pub graphs: Vec<GraphDecl>,
    #[serde(default)]
    pub bindings: Vec<BindingDecl>,
}

impl Declarations {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// One graph (root injector or nested extension).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDecl {
    pub name: String,
    /// The graph's own type; requesting it yields the graph itself.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Entry points the generated graph exposes.
    #[serde(default)]
    pub requests: Vec<KeyDecl>,
    #[serde(default)]
    pub site: Option<DeclarationSite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDecl {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub qualifier: Option<QualifierDecl>,
}

impl KeyDecl {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            qualifier: None,
        }
    }

    #[must_use]
    pub fn named(mut self, value: impl Into<String>) -> Self {
        let mut args = BTreeMap::new();
        args.insert("value".to_string(), value.into());
        self.qualifier = Some(QualifierDecl {
            name: "Named".to_string(),
            args,
        });
        self
    }

    pub fn to_key(&self) -> Result<BindingKey, TypeParseError> {
        let ty = TypeRef::parse(&self.ty)?;
        Ok(match &self.qualifier {
            Some(qualifier) => BindingKey::qualified(ty, qualifier.to_qualifier()),
            None => BindingKey::new(ty),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QualifierDecl {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl QualifierDecl {
    pub fn to_qualifier(&self) -> Qualifier {
        let mut qualifier = Qualifier::new(self.name.clone());
        for (name, value) in &self.args {
            qualifier = qualifier.with_arg(name.clone(), value.clone());
        }
        qualifier
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclKind {
    Constructor,
    Provider,
    Alias,
    Instance,
    Contribution,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDecl {
    /// Owning graph; absent for free-floating constructor-injected classes.
    #[serde(default)]
    pub graph: Option<String>,
    pub kind: DeclKind,
    pub key: KeyDecl,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDecl>,
    #[serde(default)]
    pub contribution: Option<ContributionDecl>,
    #[serde(default)]
    pub site: Option<DeclarationSite>,
}

impl BindingDecl {
    pub fn new(kind: DeclKind, key: KeyDecl) -> Self {
        Self {
            graph: None,
            kind,
            key,
            scope: None,
            dependencies: Vec::new(),
            contribution: None,
            site: None,
        }
    }

    #[must_use]
    pub fn in_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    #[must_use]
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn depends_on(mut self, key: KeyDecl, indirection: Indirection) -> Self {
        self.dependencies.push(DependencyDecl {
            key,
            indirection,
            deferrable: false,
        });
        self
    }

    #[must_use]
    pub fn depends_on_deferrable(mut self, key: KeyDecl) -> Self {
        self.dependencies.push(DependencyDecl {
            key,
            indirection: Indirection::Direct,
            deferrable: true,
        });
        self
    }

    #[must_use]
    pub fn contributes_to(mut self, collection: KeyDecl, kind: ContributionKind) -> Self {
        self.contribution = Some(ContributionDecl {
            collection,
            kind,
            map_key: None,
        });
        self
    }

    #[must_use]
    pub fn with_map_key(mut self, map_key: impl Into<String>) -> Self {
        if let Some(contribution) = &mut self.contribution {
            contribution.map_key = Some(map_key.into());
        }
        self
    }

    #[must_use]
    pub fn at(mut self, site: DeclarationSite) -> Self {
        self.site = Some(site);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyDecl {
    pub key: KeyDecl,
    #[serde(default)]
    pub indirection: Indirection,
    #[serde(default)]
    pub deferrable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDecl {
    pub collection: KeyDecl,
    pub kind: ContributionKind,
    #[serde(default)]
    pub map_key: Option<String>,
}

impl GraphDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            parent: None,
            scopes: Vec::new(),
            requests: Vec::new(),
            site: None,
        }
    }

    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    #[must_use]
    pub fn requests(mut self, key: KeyDecl) -> Self {
        self.requests.push(key);
        self
    }
}
