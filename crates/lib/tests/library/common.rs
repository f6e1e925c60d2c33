use std::sync::Arc;

use archsplit_lib::props::{FieldDecl, Fragment, FragmentType};
use archsplit_lib::{Engine, ModuleGraph, PropertySet};
use archsplit_lib::{Capabilities, ModuleDecl};
use archsplit_platform::{OsType, ProductVariables};

/// Product variables from their JSON form.
pub fn vars(json: &str) -> ProductVariables {
  serde_json::from_str(json).expect("valid product variables")
}

/// Linux build machine, x86_64 + x86 host, arm64 + arm device.
pub fn device_engine() -> Engine {
  Engine::new(
    OsType::Linux,
    &vars(r#"{"HostArch": "x86_64", "HostSecondaryArch": "x86", "DeviceArch": "arm64", "DeviceSecondaryArch": "arm"}"#),
  )
  .expect("valid configuration")
}

pub fn engine(build_os: OsType, json: &str) -> Engine {
  Engine::new(build_os, &vars(json)).expect("valid configuration")
}

/// Property struct shared by most test modules.
pub fn cc_type() -> Arc<FragmentType> {
  Arc::new(
    FragmentType::new("cc")
      .field(FieldDecl::bool("enabled").arch_variant())
      .field(FieldDecl::string_list("srcs").arch_variant())
      .field(FieldDecl::string_list("cflags").arch_variant().prepend())
      .field(FieldDecl::string_list("ldflags").arch_variant().replace())
      .field(FieldDecl::string("stl").arch_variant())
      .field(FieldDecl::string("owner")),
  )
}

pub fn srcs(values: &[&str]) -> Fragment {
  Fragment::new().with("srcs", values.to_vec())
}

pub fn cc_module(name: &str, caps: Capabilities) -> ModuleDecl {
  ModuleDecl::new(name, caps).property_set(PropertySet::new(cc_type()))
}

/// Arch variation names of `name`, in creation order.
pub fn arch_names(graph: &ModuleGraph, name: &str) -> Vec<String> {
  graph
    .variants(name)
    .iter()
    .map(|m| m.variation("arch").to_string())
    .collect()
}

/// OS variation names of `name`, in creation order.
pub fn os_names(graph: &ModuleGraph, name: &str) -> Vec<String> {
  graph
    .variants(name)
    .iter()
    .map(|m| m.variation("os").to_string())
    .collect()
}

pub fn cc_srcs<'a>(graph: &'a ModuleGraph, name: &str, os: &str, arch: &str) -> &'a [String] {
  graph
    .variant(name, &[("os", os), ("arch", arch)])
    .and_then(|m| m.properties("cc"))
    .map(|p| p.list("srcs"))
    .expect("variant with cc properties")
}
