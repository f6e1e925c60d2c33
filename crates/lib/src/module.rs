//! Module declarations and the per-variant module state.
//!
//! A `ModuleDecl` is what a collaborator hands to the engine: a name, a
//! capability descriptor, multilib settings, property sets and declared
//! dependencies. Each `Module` is one variant of such a declaration. Variants
//! start as a single copy of the declaration and are cloned by every
//! transition phase that splits them.

use std::collections::BTreeMap;
use std::sync::Arc;

use archsplit_platform::{Config, OsClass, OsType, Target};
use serde::{Deserialize, Serialize};

use crate::error::PropertyError;
use crate::props::{Fragment, FragmentType, PropertyOverrides, SchemaCache, squash_arch, squash_os, validate_fragment};

/// Image a variant is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariation {
  #[default]
  Core,
  Vendor,
  Product,
  Ramdisk,
  VendorRamdisk,
  DebugRamdisk,
  Recovery,
}

/// Partition class a module installs into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallLocation {
  #[default]
  System,
  Ramdisk,
  VendorRamdisk,
  DebugRamdisk,
  Recovery,
}

impl InstallLocation {
  /// Locations that only ever hold the primary device architecture.
  pub fn primary_arch_only(&self) -> bool {
    !matches!(self, InstallLocation::System)
  }
}

/// Capability descriptor of a module, fixed when the module is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
  /// The module gets OS and arch variants at all.
  pub arch_specific: bool,
  pub host_supported: bool,
  pub host_cross_supported: bool,
  pub device_supported: bool,
  pub native_bridge_supported: bool,
  /// `compile_multilib` used when the module does not set one.
  pub default_multilib: String,
  /// One variant per selected target. When unset, the module builds all of
  /// its targets from a single common variant.
  pub uses_target_variants: bool,
  /// Add an aggregate `common_os` variant after the per-OS variants.
  pub create_common_os_variant: bool,
  pub image_variation: ImageVariation,
  pub install_location: InstallLocation,
}

impl Default for Capabilities {
  fn default() -> Self {
    Self {
      arch_specific: true,
      host_supported: false,
      host_cross_supported: true,
      device_supported: true,
      native_bridge_supported: false,
      default_multilib: "first".to_string(),
      uses_target_variants: true,
      create_common_os_variant: false,
      image_variation: ImageVariation::Core,
      install_location: InstallLocation::System,
    }
  }
}

impl Capabilities {
  /// A module built only for the machines running the build.
  pub fn host_only() -> Self {
    Self {
      host_supported: true,
      device_supported: false,
      ..Self::default()
    }
  }

  /// A module built for both host and device.
  pub fn host_and_device() -> Self {
    Self {
      host_supported: true,
      ..Self::default()
    }
  }

  /// A module with no OS or arch variants.
  pub fn not_arch_specific() -> Self {
    Self {
      arch_specific: false,
      ..Self::default()
    }
  }

  /// Whether the module can be built for `target`.
  pub fn supports_target(&self, target: &Target) -> bool {
    match target.os.class() {
      OsClass::Host if target.host_cross => self.host_supported && self.host_cross_supported,
      OsClass::Host => self.host_supported,
      OsClass::Device => self.device_supported,
      OsClass::Generic => false,
    }
  }
}

/// The `compile_multilib` family of module properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultilibProperties {
  pub compile_multilib: Option<String>,
  /// `target.host.compile_multilib`
  pub host_compile_multilib: Option<String>,
  /// `target.android.compile_multilib`
  pub android_compile_multilib: Option<String>,
}

/// One property struct of a module: its declared type, the values set at the
/// top level, and the values set under override paths such as `arch.arm`.
#[derive(Debug, Clone)]
pub struct PropertySet {
  pub fragment_type: Arc<FragmentType>,
  pub base: Fragment,
  pub overrides: BTreeMap<String, Fragment>,
}

impl PropertySet {
  pub fn new(fragment_type: Arc<FragmentType>) -> Self {
    Self {
      fragment_type,
      base: Fragment::new(),
      overrides: BTreeMap::new(),
    }
  }

  pub fn with_base(mut self, base: Fragment) -> Self {
    self.base = base;
    self
  }

  /// Values set under the override path `scope`, e.g. `target.android`.
  pub fn with_override(mut self, scope: impl Into<String>, values: Fragment) -> Self {
    self.overrides.insert(scope.into(), values);
    self
  }
}

/// A dependency on another module, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
  pub name: String,
  /// Free-form tag understood by the collaborator that declared it.
  pub tag: String,
}

/// A module as declared in source.
#[derive(Debug, Clone)]
pub struct ModuleDecl {
  pub name: String,
  pub capabilities: Capabilities,
  pub multilib: MultilibProperties,
  pub properties: Vec<PropertySet>,
  pub deps: Vec<DependencyDecl>,
}

impl ModuleDecl {
  pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
    Self {
      name: name.into(),
      capabilities,
      multilib: MultilibProperties::default(),
      properties: Vec::new(),
      deps: Vec::new(),
    }
  }

  pub fn compile_multilib(mut self, multilib: impl Into<String>) -> Self {
    self.multilib.compile_multilib = Some(multilib.into());
    self
  }

  pub fn multilib(mut self, multilib: MultilibProperties) -> Self {
    self.multilib = multilib;
    self
  }

  pub fn property_set(mut self, set: PropertySet) -> Self {
    self.properties.push(set);
    self
  }

  pub fn dep(mut self, name: impl Into<String>, tag: impl Into<String>) -> Self {
    self.deps.push(DependencyDecl {
      name: name.into(),
      tag: tag.into(),
    });
    self
  }
}

/// One variant of a module.
#[derive(Debug, Clone)]
pub struct Module {
  name: String,
  caps: Capabilities,
  multilib: MultilibProperties,

  fragment_types: Vec<Arc<FragmentType>>,
  /// Effective properties, one per fragment type, squashed in place.
  properties: Vec<Fragment>,
  /// Override trees shared by all variants of the module. `None` for modules
  /// that are not arch-specific.
  arch: Option<Arc<Vec<PropertyOverrides>>>,

  compile_os: Option<OsType>,
  compile_target: Option<Target>,
  compile_multi_targets: Vec<Target>,
  compile_primary: bool,
  arch_ready: bool,

  variations: Vec<(&'static str, String)>,
  disabled: bool,
  skip_install: bool,
}

impl Module {
  pub(crate) fn new(name: String, caps: Capabilities, multilib: MultilibProperties) -> Self {
    let arch = caps.arch_specific.then(|| Arc::new(Vec::new()));
    Self {
      name,
      caps,
      multilib,
      fragment_types: Vec::new(),
      properties: Vec::new(),
      arch,
      compile_os: None,
      compile_target: None,
      compile_multi_targets: Vec::new(),
      compile_primary: false,
      arch_ready: false,
      variations: Vec::new(),
      disabled: false,
      skip_install: false,
    }
  }

  /// Load the declared property sets and build their override trees.
  ///
  /// On error the module keeps its base values and has no overrides.
  pub(crate) fn init_properties(&mut self, sets: Vec<PropertySet>, cache: &SchemaCache) -> Result<(), PropertyError> {
    self.fragment_types = sets.iter().map(|s| Arc::clone(&s.fragment_type)).collect();
    self.properties = sets.iter().map(|s| s.base.clone()).collect();

    for set in &sets {
      validate_fragment(&set.fragment_type, &set.base, "")?;
    }

    if !self.caps.arch_specific {
      if let Some(scope) = sets.iter().flat_map(|s| s.overrides.keys()).next() {
        return Err(PropertyError::NotArchSpecific(scope.clone()));
      }
      return Ok(());
    }

    let overrides = sets
      .iter()
      .map(|set| PropertyOverrides::new(Arc::clone(&set.fragment_type), &set.overrides, cache))
      .collect::<Result<Vec<_>, _>>()?;
    self.arch = Some(Arc::new(overrides));
    Ok(())
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn capabilities(&self) -> &Capabilities {
    &self.caps
  }

  pub fn multilib_properties(&self) -> &MultilibProperties {
    &self.multilib
  }

  /// Resolved OS, once the OS phase has run.
  pub fn os(&self) -> Option<OsType> {
    self.compile_os
  }

  /// Resolved target, once the arch phase has run.
  pub fn target(&self) -> Option<&Target> {
    self.compile_target.as_ref()
  }

  /// Extra targets a common-style variant builds for.
  pub fn multi_targets(&self) -> &[Target] {
    &self.compile_multi_targets
  }

  pub fn is_primary(&self) -> bool {
    self.compile_primary
  }

  pub fn arch_ready(&self) -> bool {
    self.arch_ready
  }

  pub fn skip_install(&self) -> bool {
    self.skip_install
  }

  /// Effective properties of the fragment type named `type_name`.
  pub fn properties(&self, type_name: &str) -> Option<&Fragment> {
    self
      .fragment_types
      .iter()
      .position(|ty| ty.name() == type_name)
      .map(|i| &self.properties[i])
  }

  /// Whether the variant should be built.
  ///
  /// An explicit `enabled` property wins, `false` over `true`. Without one,
  /// variants of default-disabled OSes are off.
  pub fn enabled(&self) -> bool {
    if self.disabled {
      return false;
    }
    let explicit: Vec<bool> = self
      .properties
      .iter()
      .filter_map(|p| p.get("enabled").and_then(|v| v.as_bool()))
      .collect();
    if explicit.contains(&false) {
      return false;
    }
    if explicit.contains(&true) {
      return true;
    }
    !self.compile_os.is_some_and(|os| os.default_disabled())
  }

  /// Variation chosen by `mutator`, empty if it did not split this module.
  pub fn variation(&self, mutator: &str) -> &str {
    self
      .variations
      .iter()
      .find(|(name, _)| *name == mutator)
      .map(|(_, v)| v.as_str())
      .unwrap_or("")
  }

  pub fn variations(&self) -> &[(&'static str, String)] {
    &self.variations
  }

  /// `true` if every variation of this variant equals the requested one, a
  /// missing request counting as empty.
  pub fn matches_variations<S: AsRef<str>>(&self, requested: &[(&str, S)]) -> bool {
    let lookup = |mutator: &str| {
      requested
        .iter()
        .find(|(name, _)| *name == mutator)
        .map(|(_, v)| v.as_ref())
        .unwrap_or("")
    };
    self.variations.iter().all(|(name, value)| lookup(*name) == value.as_str())
      && requested.iter().all(|(name, value)| self.variation(name) == value.as_ref())
  }

  /// Non-empty variations as `os:android,arch:arm64`.
  pub fn variations_string(&self) -> String {
    self
      .variations
      .iter()
      .filter(|(_, v)| !v.is_empty())
      .map(|(name, v)| format!("{name}:{v}"))
      .collect::<Vec<_>>()
      .join(",")
  }

  pub(crate) fn push_variation(&mut self, mutator: &'static str, variation: String) {
    self.variations.push((mutator, variation));
  }

  pub(crate) fn disable(&mut self) {
    self.disabled = true;
  }

  pub(crate) fn set_os(&mut self, os: OsType) {
    self.compile_os = Some(os);
  }

  pub(crate) fn set_target(&mut self, target: Target, multi_targets: Vec<Target>, primary: bool) {
    self.compile_target = Some(target);
    self.compile_multi_targets = multi_targets;
    self.compile_primary = primary;
    self.arch_ready = true;
  }

  pub(crate) fn set_skip_install(&mut self) {
    self.skip_install = true;
  }

  fn overrides(&self) -> &Arc<Vec<PropertyOverrides>> {
    match &self.arch {
      Some(arch) => arch,
      None => panic!("module {:?} squashed without override schemas", self.name),
    }
  }

  pub(crate) fn squash_os(&mut self, config: &Config) -> Result<(), PropertyError> {
    let os = match self.compile_os {
      Some(os) => os,
      None => panic!("module {:?} squashed before its OS was resolved", self.name),
    };
    let overrides = Arc::clone(self.overrides());
    squash_os(&overrides, &mut self.properties, os, config)
  }

  pub(crate) fn squash_arch(&mut self, config: &Config) -> Result<(), PropertyError> {
    let overrides = Arc::clone(self.overrides());
    let target = match &self.compile_target {
      Some(target) => target,
      None => panic!("module {:?} squashed before its target was resolved", self.name),
    };
    squash_arch(&overrides, &mut self.properties, target, config)
  }
}
