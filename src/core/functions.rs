use crate::core::layout::LayoutHook;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tera::{Function, Tera, Value};

/// The functions available to every template in a compiled set.
///
/// Entries are shared between compilations; each recompile installs the
/// current table into the fresh `Tera` instance.
#[derive(Clone, Default)]
pub struct FunctionTable {
  entries: HashMap<String, Arc<dyn Function>>,
}

impl FunctionTable {
  /// A table holding `marshal` and the layout hook under `layout_key`.
  pub fn with_builtins(layout_key: &str) -> Self {
    let mut table = Self::default();
    table.insert("marshal", marshal);
    table.insert(layout_key, LayoutHook::new(layout_key));
    table
  }

  /// Installs or overwrites a function.
  pub fn insert<F: Function + 'static>(&mut self, name: &str, function: F) {
    self.entries.insert(name.to_string(), Arc::new(function));
  }

  pub fn insert_shared(&mut self, name: &str, function: Arc<dyn Function>) {
    self.entries.insert(name.to_string(), function);
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(name)
  }

  pub(crate) fn install(&self, tera: &mut Tera) {
    for (name, function) in &self.entries {
      tera.register_function(name, Shared(Arc::clone(function)));
    }
  }
}

impl fmt::Debug for FunctionTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<_> = self.entries.keys().collect();
    names.sort();
    f.debug_struct("FunctionTable").field("names", &names).finish()
  }
}

struct Shared(Arc<dyn Function>);

impl Function for Shared {
  fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
    self.0.call(args)
  }

  fn is_safe(&self) -> bool {
    self.0.is_safe()
  }
}

/// `marshal(value=...)`: the argument serialized as compact JSON.
fn marshal(args: &HashMap<String, Value>) -> tera::Result<Value> {
  let value = args.get("value").unwrap_or(&Value::Null);
  Ok(Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tera::Context;

  #[test]
  fn test_builtins_are_present() {
    let table = FunctionTable::with_builtins("yield");
    assert!(table.contains("marshal"));
    assert!(table.contains("yield"));
    assert!(!table.contains("embed"));
  }

  #[test]
  fn test_marshal_serializes_values() {
    let mut tera = Tera::default();
    FunctionTable::with_builtins("embed").install(&mut tera);
    tera
      .add_raw_template("t", "{{ marshal(value=user) }}|{{ marshal() }}")
      .unwrap();

    let mut context = Context::new();
    context.insert("user", &user_value());
    assert_eq!(tera.render("t", &context).unwrap(), r#"{"id":7,"tags":["a"]}|null"#);
  }

  #[test]
  fn test_insert_overwrites() {
    let mut tera = Tera::default();
    let mut table = FunctionTable::with_builtins("embed");
    table.insert("marshal", |_: &HashMap<String, Value>| -> tera::Result<Value> {
      Ok(Value::String("custom".into()))
    });
    table.install(&mut tera);
    tera.add_raw_template("t", "{{ marshal(value=1) }}").unwrap();
    assert_eq!(tera.render("t", &Context::new()).unwrap(), "custom");
  }

  fn user_value() -> Value {
    let mut map = tera::Map::new();
    map.insert("id".into(), Value::from(7));
    map.insert("tags".into(), Value::from(vec!["a"]));
    Value::Object(map)
  }
}
