//! Layout composition.
//!
//! A layout is an ordinary template that calls the reserved layout function
//! (`embed()` by default) where the body belongs. Rather than rebinding that
//! function in the shared function table for every render, the function
//! looks up the innermost [`RenderScope`] active on the current thread and
//! runs the body closure it carries. Template execution is synchronous, so a
//! scope entered around a layout render is visible to exactly that render.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use tera::{Function, Value};
use thiserror::Error;

/// Renders the body template of the active layout render.
pub(crate) type BodyRenderer = dyn Fn() -> tera::Result<String>;

thread_local! {
  // A slot is `None` while its body is executing.
  static SCOPES: RefCell<Vec<Option<Rc<BodyRenderer>>>> = const { RefCell::new(Vec::new()) };
}

/// Raised by the layout function when no layout render is active.
#[derive(Debug, Error)]
#[error("no layout render is active")]
pub(crate) struct OutsideRender;

/// Guard that makes a body renderer available to the layout function.
///
/// The scope is popped on drop, including while unwinding.
pub(crate) struct RenderScope {
  // Scopes are thread-local; the guard must be dropped where it was created.
  _not_send: PhantomData<Rc<()>>,
}

impl RenderScope {
  pub(crate) fn enter(body: Rc<BodyRenderer>) -> Self {
    SCOPES.with(|scopes| scopes.borrow_mut().push(Some(body)));
    Self { _not_send: PhantomData }
  }
}

impl Drop for RenderScope {
  fn drop(&mut self) {
    SCOPES.with(|scopes| {
      scopes.borrow_mut().pop();
    });
  }
}

/// The function installed under the reserved layout key.
#[derive(Debug, Clone)]
pub(crate) struct LayoutHook {
  key: String,
}

impl LayoutHook {
  pub(crate) fn new(key: &str) -> Self {
    Self { key: key.to_string() }
  }
}

impl Function for LayoutHook {
  fn call(&self, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let active = SCOPES.with(|scopes| {
      let mut scopes = scopes.borrow_mut();
      let index = scopes.iter().rposition(Option::is_some)?;
      scopes[index].take().map(|body| (index, body))
    });
    let Some((index, body)) = active else {
      return Err(tera::Error::chain(
        format!("`{}` called outside of a layout render", self.key),
        OutsideRender,
      ));
    };

    let rendered = body();
    SCOPES.with(|scopes| {
      if let Some(slot) = scopes.borrow_mut().get_mut(index) {
        *slot = Some(body);
      }
    });
    rendered.map(Value::String)
  }

  // The body was already escaped by its own render.
  fn is_safe(&self) -> bool {
    true
  }
}

/// Whether a render failed because the layout function ran without a scope.
pub(crate) fn invoked_outside_render(err: &tera::Error) -> bool {
  let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
  while let Some(err) = current {
    if err.is::<OutsideRender>() {
      return true;
    }
    current = err.source();
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;

  fn call(hook: &LayoutHook) -> tera::Result<Value> {
    hook.call(&HashMap::new())
  }

  #[test]
  fn test_hook_fails_without_scope() {
    let err = call(&LayoutHook::new("embed")).unwrap_err();
    assert!(invoked_outside_render(&err));
    assert!(err.to_string().contains("embed"));
  }

  #[test]
  fn test_hook_renders_innermost_body() {
    let hook = LayoutHook::new("embed");
    let _outer = RenderScope::enter(Rc::new(|| Ok("outer".to_string())));
    {
      let _inner = RenderScope::enter(Rc::new(|| Ok("inner".to_string())));
      assert_eq!(call(&hook).unwrap(), Value::String("inner".into()));
      // The slot is restored, so a layout may embed its body twice.
      assert_eq!(call(&hook).unwrap(), Value::String("inner".into()));
    }
    assert_eq!(call(&hook).unwrap(), Value::String("outer".into()));
  }

  #[test]
  fn test_body_reaching_hook_does_not_recurse() {
    let hook = LayoutHook::new("embed");
    let nested = hook.clone();
    let _scope = RenderScope::enter(Rc::new(move || {
      nested
        .call(&HashMap::new())
        .map(|value| value.as_str().unwrap_or_default().to_string())
    }));
    let err = call(&hook).unwrap_err();
    assert!(invoked_outside_render(&err));
  }

  #[test]
  fn test_scope_is_released_on_drop() {
    {
      let _scope = RenderScope::enter(Rc::new(|| Ok("body".to_string())));
    }
    assert!(call(&LayoutHook::new("embed")).is_err());
  }

  #[test]
  fn test_unrelated_errors_are_not_outside_render() {
    assert!(!invoked_outside_render(&tera::Error::msg("boom")));
  }
}
