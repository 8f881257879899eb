//! Route configuration and compiled route records

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Deserializer};

use crate::component::{ComponentDef, ComponentSlot};
use crate::guard::{GuardRef, NavigationGuard};
use crate::location::Location;
use crate::pattern::PathPattern;
use crate::route::Route;
use crate::types::{Meta, Params, DEFAULT_VIEW};

/// Dynamic redirect target computed from the route being resolved
pub type RedirectFn = Arc<dyn Fn(&Route) -> Location + Send + Sync>;

/// Dynamic props computed from the resolved route
pub type PropsFn = Arc<dyn Fn(&Route) -> Meta + Send + Sync>;

/// Where a redirect record sends the navigation
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum RedirectOption {
    Path(String),
    Location(Location),
    #[serde(skip)]
    Dynamic(RedirectFn),
}

impl std::fmt::Debug for RedirectOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectOption::Path(path) => f.debug_tuple("Path").field(path).finish(),
            RedirectOption::Location(loc) => f.debug_tuple("Location").field(loc).finish(),
            RedirectOption::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl RedirectOption {
    /// Target location for `route`
    pub fn target(&self, route: &Route) -> Location {
        match self {
            RedirectOption::Path(path) => Location::path(path.clone()),
            RedirectOption::Location(loc) => loc.clone(),
            RedirectOption::Dynamic(f) => f(route),
        }
    }
}

/// How a matched route feeds props to its view
#[derive(Clone, Default)]
pub enum PropsOption {
    #[default]
    Off,
    /// Pass route params as props
    Params,
    Static(Meta),
    Dynamic(PropsFn),
}

impl std::fmt::Debug for PropsOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropsOption::Off => f.write_str("Off"),
            PropsOption::Params => f.write_str("Params"),
            PropsOption::Static(v) => f.debug_tuple("Static").field(v).finish(),
            PropsOption::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl PropsOption {
    /// Props handed to the view for `route`
    pub fn resolve(&self, route: &Route) -> Meta {
        match self {
            PropsOption::Off => Meta::Null,
            PropsOption::Params => serde_json::to_value(route.params()).unwrap_or_default(),
            PropsOption::Static(value) => value.clone(),
            PropsOption::Dynamic(f) => f(route),
        }
    }
}

impl<'de> Deserialize<'de> for PropsOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Meta::deserialize(deserializer)? {
            Meta::Bool(true) => PropsOption::Params,
            Meta::Bool(false) | Meta::Null => PropsOption::Off,
            value => PropsOption::Static(value),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ViewNames {
    Default(String),
    Named(BTreeMap<String, String>),
}

/// Views given by name in JSON become plain component definitions
fn view_names<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, ComponentSlot>, D::Error> {
    let names = match ViewNames::deserialize(deserializer)? {
        ViewNames::Default(name) => BTreeMap::from([(DEFAULT_VIEW.to_string(), name)]),
        ViewNames::Named(map) => map,
    };
    Ok(names
        .into_iter()
        .map(|(view, name)| (view, ComponentSlot::from(ComponentDef::new(name))))
        .collect())
}

/// A node of the route tree as supplied by the application
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteConfig {
    pub path: String,
    pub name: Option<String>,
    #[serde(alias = "component", deserialize_with = "view_names")]
    pub components: BTreeMap<String, ComponentSlot>,
    pub redirect: Option<RedirectOption>,
    #[serde(deserialize_with = "one_or_many")]
    pub alias: Vec<String>,
    pub children: Vec<RouteConfig>,
    pub meta: Meta,
    #[serde(skip)]
    pub before_enter: Option<GuardRef>,
    pub props: PropsOption,
    pub case_sensitive: bool,
}

impl std::fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteConfig")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("views", &self.components.keys().collect::<Vec<_>>())
            .field("redirect", &self.redirect)
            .field("alias", &self.alias)
            .field("children", &self.children)
            .finish()
    }
}

impl RouteConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the `default` view
    pub fn component(self, component: impl Into<ComponentSlot>) -> Self {
        self.view(DEFAULT_VIEW, component)
    }

    pub fn view(mut self, name: impl Into<String>, component: impl Into<ComponentSlot>) -> Self {
        self.components.insert(name.into(), component.into());
        self
    }

    pub fn redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(RedirectOption::Path(target.into()));
        self
    }

    pub fn redirect_to(mut self, target: Location) -> Self {
        self.redirect = Some(RedirectOption::Location(target));
        self
    }

    pub fn redirect_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Route) -> Location + Send + Sync + 'static,
    {
        self.redirect = Some(RedirectOption::Dynamic(Arc::new(f)));
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias.push(alias.into());
        self
    }

    pub fn child(mut self, child: RouteConfig) -> Self {
        self.children.push(child);
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn before_enter(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_enter = Some(Arc::new(guard));
        self
    }

    pub fn props(mut self, props: PropsOption) -> Self {
        self.props = props;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

/// Compiled node of the route tree
///
/// Records are owned by the matcher. `parent` is a back-reference used
/// only to rebuild the matched chain from a leaf.
pub struct RouteRecord {
    path: String,
    pattern: PathPattern,
    components: BTreeMap<String, ComponentSlot>,
    name: Option<String>,
    parent: Weak<RouteRecord>,
    redirect: Option<RedirectOption>,
    match_as: Option<String>,
    meta: Meta,
    before_enter: Option<GuardRef>,
    props: PropsOption,
}

impl std::fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRecord")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("parent", &self.parent().map(|p| p.path.clone()))
            .field("redirect", &self.redirect)
            .field("match_as", &self.match_as)
            .field("components", &self.components)
            .field("meta", &self.meta)
            .field("props", &self.props)
            .finish()
    }
}

/// Field set for [`RouteRecord::new`]
pub(crate) struct RecordParts {
    pub path: String,
    pub pattern: PathPattern,
    pub components: BTreeMap<String, ComponentSlot>,
    pub name: Option<String>,
    pub parent: Option<Arc<RouteRecord>>,
    pub redirect: Option<RedirectOption>,
    pub match_as: Option<String>,
    pub meta: Meta,
    pub before_enter: Option<GuardRef>,
    pub props: PropsOption,
}

impl RouteRecord {
    pub(crate) fn new(parts: RecordParts) -> Self {
        Self {
            path: parts.path,
            pattern: parts.pattern,
            components: parts.components,
            name: parts.name,
            parent: parts.parent.as_ref().map(Arc::downgrade).unwrap_or_default(),
            redirect: parts.redirect,
            match_as: parts.match_as,
            meta: parts.meta,
            before_enter: parts.before_enter,
            props: parts.props,
        }
    }

    /// Absolute path of this record
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn components(&self) -> &BTreeMap<String, ComponentSlot> {
        &self.components
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<Arc<RouteRecord>> {
        self.parent.upgrade()
    }

    pub fn redirect(&self) -> Option<&RedirectOption> {
        self.redirect.as_ref()
    }

    /// Path of the record an alias record stands for
    pub fn match_as(&self) -> Option<&str> {
        self.match_as.as_deref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn before_enter(&self) -> Option<&GuardRef> {
        self.before_enter.as_ref()
    }

    pub fn props(&self) -> &PropsOption {
        &self.props
    }

    /// Params of `route` that this record's pattern declares
    pub fn own_params(&self, route: &Route) -> Params {
        self.pattern
            .keys()
            .iter()
            .filter_map(|k| route.params().get(&k.name).map(|v| (k.name.clone(), v.clone())))
            .collect()
    }
}
