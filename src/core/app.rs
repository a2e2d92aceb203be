use crate::core::functions::FunctionTable;
use crate::core::layout::{self, BodyRenderer, RenderScope};
use crate::core::reload::{self, TemplateWatcher};
use crate::core::source::{Catalog, TemplateSource};
use crate::core::syntax::Delimiters;
use crate::error::{EmberViewError, Result};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;
use tera::{Context, Function, Tera};

type Configurator = Arc<dyn Fn(&mut Tera) + Send + Sync>;

/// A framework-agnostic representation of a template to be rendered.
///
/// It is created by [`TeraViews::render`]. Web framework integration layers
/// use it to implement their native response traits.
pub struct Template {
  pub(crate) views: TeraViews,
  pub(crate) template_name: String,
  pub(crate) layout: Option<String>,
  pub(crate) context: Context,
}

impl Template {
  /// Wraps the rendered template in the layout template `name`.
  pub fn layout(mut self, name: &str) -> Self {
    self.layout = Some(name.to_string());
    self
  }

  pub(crate) fn render(&self) -> Result<String> {
    self
      .views
      .render_string(&self.template_name, &self.context, self.layout.as_deref())
  }
}

/// Everything guarded by the store's single lock.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
  functions: FunctionTable,
  set: Option<Arc<Tera>>,
  loaded: bool,
  reload: bool,
}

impl StoreState {
  fn fresh_set(&self) -> Option<Arc<Tera>> {
    match &self.set {
      Some(set) if self.loaded && !self.reload => Some(Arc::clone(set)),
      _ => None,
    }
  }
}

struct Settings {
  base_name: String,
  delimiters: Delimiters,
  extension: String,
  layout_key: String,
  autoescape: bool,
  configurators: Vec<Configurator>,
}

struct ViewsInner {
  settings: Settings,
  source: TemplateSource,
  global_context: Context,
  state: Arc<RwLock<StoreState>>,
  // Serializes recompiles so two renders racing on a stale set compile once.
  compile: Mutex<()>,
  _watcher: Mutex<Option<TemplateWatcher>>,
}

/// The template store: a compiled set of named templates and how to render them.
///
/// Cheap to clone and safe to share across threads. Templates are compiled on
/// first use and recompiled, as a whole set, after a change is observed in a
/// live source directory.
#[derive(Clone)]
pub struct TeraViews {
  inner: Arc<ViewsInner>,
}

impl TeraViews {
  /// Creates a new `TeraViewsBuilder` reading templates from `source`.
  ///
  /// This is the main entry point for using the library.
  pub fn builder(source: TemplateSource) -> TeraViewsBuilder {
    TeraViewsBuilder::new(source)
  }

  pub fn source(&self) -> &TemplateSource {
    &self.inner.source
  }

  /// The reserved function name a layout calls to place its body.
  pub fn layout_key(&self) -> &str {
    &self.inner.settings.layout_key
  }

  /// Installs or overwrites a template function.
  ///
  /// Takes effect at the next compilation, which this schedules.
  pub fn register_function<F: Function + 'static>(&self, name: &str, function: F) {
    let mut state = self.inner.state.write();
    state.functions.insert(name, function);
    state.reload = true;
  }

  /// Marks the compiled set stale; the next render recompiles it.
  pub fn request_reload(&self) {
    self.inner.state.write().reload = true;
  }

  pub fn reload_requested(&self) -> bool {
    self.inner.state.read().reload
  }

  pub fn is_loaded(&self) -> bool {
    self.inner.state.read().loaded
  }

  /// Compiles the template set unless a current one is already published.
  pub fn load(&self) -> Result<()> {
    self.published().map(|_| ())
  }

  /// Names of every template in the current set, sorted.
  pub fn template_names(&self) -> Result<Vec<String>> {
    let set = self.published()?;
    let mut names: Vec<String> = set.get_template_names().map(str::to_string).collect();
    names.sort();
    Ok(names)
  }

  /// Renders `name` against `binding` into `out`.
  ///
  /// With a `layout`, the layout template is executed instead and the body
  /// is rendered wherever it calls the layout function. A failure inside the
  /// body is reported against the body's name. Output already written when
  /// execution fails is not rolled back.
  pub fn render_to<W: Write>(&self, out: W, name: &str, binding: &Context, layout: Option<&str>) -> Result<()> {
    let set = self.published()?;
    if !has_template(&set, name) {
      return Err(EmberViewError::TemplateNotFound(name.to_string()));
    }
    let context = self.merged(binding);

    let Some(layout) = layout.filter(|layout| !layout.is_empty()) else {
      return set
        .render_to(name, &context, out)
        .map_err(|e| self.execution_error(name, e));
    };
    if !has_template(&set, layout) {
      return Err(EmberViewError::LayoutNotFound(layout.to_string()));
    }

    // Set when the failure came from the body rather than the layout itself.
    let body_failed = Rc::new(Cell::new(false));
    let body: Rc<BodyRenderer> = {
      let set = Arc::clone(&set);
      let context = context.clone();
      let name = name.to_string();
      let body_failed = Rc::clone(&body_failed);
      Rc::new(move || set.render(&name, &context).inspect_err(|_| body_failed.set(true)))
    };
    let _scope = RenderScope::enter(body);
    set.render_to(layout, &context, out).map_err(|e| {
      let failed = if body_failed.get() { name } else { layout };
      self.execution_error(failed, e)
    })
  }

  /// Like [`render_to`](Self::render_to), collecting the output into a string.
  pub fn render_string(&self, name: &str, binding: &Context, layout: Option<&str>) -> Result<String> {
    let mut out = Vec::new();
    self.render_to(&mut out, name, binding, layout)?;
    String::from_utf8(out).map_err(|e| EmberViewError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
  }

  /// Renders with any serializable binding that maps to an object.
  pub fn render_value<W: Write, T: Serialize>(
    &self,
    out: W,
    name: &str,
    binding: &T,
    layout: Option<&str>,
  ) -> Result<()> {
    let context = Context::from_serialize(binding).map_err(|e| EmberViewError::Serialization(e.to_string()))?;
    self.render_to(out, name, &context, layout)
  }

  /// Builds a [`Template`] for a web framework to render as a response.
  pub fn render(&self, name: &str, context: Context) -> Template {
    Template {
      views: self.clone(),
      template_name: name.to_string(),
      layout: None,
      context,
    }
  }

  /// The published set, compiling first when there is none or it is stale.
  fn published(&self) -> Result<Arc<Tera>> {
    if let Some(set) = self.inner.state.read().fresh_set() {
      return Ok(set);
    }

    let _compiling = self.inner.compile.lock();
    // Another render may have compiled while we waited.
    let functions = {
      let mut state = self.inner.state.write();
      if let Some(set) = state.fresh_set() {
        return Ok(set);
      }
      // A reload request arriving from here on must survive this compile.
      state.reload = false;
      state.loaded = false;
      state.set = None;
      state.functions.clone()
    };

    match self.compile(&functions) {
      Ok(tera) => {
        let set = Arc::new(tera);
        let mut state = self.inner.state.write();
        state.set = Some(Arc::clone(&set));
        state.loaded = true;
        Ok(set)
      }
      Err(e) => {
        log::error!("Failed to load templates from '{}': {}", self.inner.settings.base_name, e);
        self.inner.state.write().reload = true;
        Err(e)
      }
    }
  }

  /// Builds a fresh set from every template file in the source.
  fn compile(&self, functions: &FunctionTable) -> Result<Tera> {
    let settings = &self.inner.settings;
    let catalog = Catalog::scan(&self.inner.source, &settings.extension)?;

    let mut templates = Vec::new();
    for (path, name) in catalog.templates() {
      let raw = self.inner.source.read(path)?;
      let text = std::str::from_utf8(&raw).map_err(|e| EmberViewError::TemplateParse {
        name: name.to_string(),
        source: tera::Error::chain("template is not valid UTF-8", e),
      })?;
      let translated = settings
        .delimiters
        .translate(text)
        .map_err(|e| EmberViewError::TemplateParse {
          name: name.to_string(),
          source: tera::Error::chain("invalid action delimiters", e),
        })?;
      log::debug!("views: parsed template: {}", name);
      templates.push((name.to_string(), translated));
    }

    let mut tera = Tera::default();
    if settings.autoescape {
      // Names carry no extension, so match every name.
      tera.autoescape_on(vec![""]);
    } else {
      tera.autoescape_on(vec![]);
    }
    functions.install(&mut tera);
    for configurator in &settings.configurators {
      configurator(&mut tera);
    }

    let count = templates.len();
    if let Err(e) = tera.add_raw_templates(templates.iter().map(|(name, body)| (name.as_str(), body.as_str()))) {
      return Err(parse_failure(&templates, &settings.base_name, e));
    }
    log::info!("Compiled {} templates from '{}'", count, settings.base_name);
    Ok(tera)
  }

  fn merged(&self, binding: &Context) -> Context {
    // Binding values overwrite the globals.
    let mut context = self.inner.global_context.clone();
    context.extend(binding.clone());
    context
  }

  fn execution_error(&self, name: &str, source: tera::Error) -> EmberViewError {
    if layout::invoked_outside_render(&source) {
      EmberViewError::LayoutInvokedOutsideRender(self.inner.settings.layout_key.clone())
    } else {
      EmberViewError::TemplateExecution {
        name: name.to_string(),
        source,
      }
    }
  }
}

impl fmt::Debug for TeraViews {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let settings = &self.inner.settings;
    f.debug_struct("TeraViews")
      .field("base_name", &settings.base_name)
      .field("source", &self.inner.source)
      .field("extension", &settings.extension)
      .field("layout_key", &settings.layout_key)
      .field("loaded", &self.is_loaded())
      .finish_non_exhaustive()
  }
}

fn has_template(set: &Tera, name: &str) -> bool {
  set.get_template(name).is_ok()
}

/// Attributes a set-wide compile error to the template it names.
fn parse_failure(templates: &[(String, String)], base_name: &str, source: tera::Error) -> EmberViewError {
  let message = source.to_string();
  let name = templates
    .iter()
    .map(|(name, _)| name)
    .find(|name| message.contains(&format!("'{name}'")) || message.contains(&format!("\"{name}\"")))
    .cloned()
    .unwrap_or_else(|| base_name.to_string());
  EmberViewError::TemplateParse { name, source }
}

/// A builder for creating a configured `TeraViews` instance.
pub struct TeraViewsBuilder {
  source: TemplateSource,
  base_name: Option<String>,
  delimiters: Delimiters,
  extension: String,
  layout_key: String,
  autoescape: bool,
  watch: bool,
  globals: Context,
  functions: Vec<(String, Arc<dyn Function>)>,
  configurators: Vec<Configurator>,
}

impl TeraViewsBuilder {
  pub(crate) fn new(source: TemplateSource) -> Self {
    Self {
      source,
      base_name: None,
      delimiters: Delimiters::default(),
      extension: ".html".to_string(),
      layout_key: "embed".to_string(),
      autoescape: true,
      watch: true,
      globals: Context::new(),
      functions: Vec::new(),
      configurators: Vec::new(),
    }
  }

  /// Sets the action delimiters. Defaults to `<%` and `%>`.
  pub fn delimiters(mut self, left: &str, right: &str) -> Self {
    self.delimiters = Delimiters::new(left, right);
    self
  }

  /// Sets the template file extension. Defaults to `.html`.
  pub fn extension(mut self, extension: &str) -> Self {
    self.extension = extension.to_string();
    self
  }

  /// Sets the function name layouts call to place their body. Defaults to `embed`.
  pub fn layout_key(mut self, key: &str) -> Self {
    self.layout_key = key.to_string();
    self
  }

  /// Names the template set in logs and errors. Defaults to the source's name.
  pub fn base_name(mut self, name: &str) -> Self {
    self.base_name = Some(name.to_string());
    self
  }

  /// HTML-escapes every expression output. Defaults to `true`.
  pub fn autoescape(mut self, enabled: bool) -> Self {
    self.autoescape = enabled;
    self
  }

  /// Watches a live source directory for template changes. Defaults to `true`.
  ///
  /// Has no effect on snapshots, which never change.
  pub fn watch(mut self, enabled: bool) -> Self {
    self.watch = enabled;
    self
  }

  /// Adds a global variable that will be available to all templates.
  ///
  /// Values in a render's own binding take precedence.
  pub fn add_global<S: Into<String>, T: Serialize>(mut self, key: S, value: T) -> Self {
    self.globals.insert(key.into(), &value);
    self
  }

  /// Registers a template function. Overwriting `marshal` or the layout key is allowed.
  pub fn register_function<F: Function + 'static>(mut self, name: &str, function: F) -> Self {
    self.functions.push((name.to_string(), Arc::new(function)));
    self
  }

  /// Provides a closure to run on every freshly compiled `Tera` instance.
  ///
  /// This is the escape hatch to register filters and testers, or to tweak
  /// Tera settings. It runs again on each recompilation.
  pub fn configure_tera<F>(mut self, configurator: F) -> Self
  where
    F: Fn(&mut Tera) + Send + Sync + 'static,
  {
    self.configurators.push(Arc::new(configurator));
    self
  }

  /// Consumes the builder to construct the final `TeraViews` store.
  ///
  /// Templates are compiled lazily on first render. If the source is a live
  /// directory and watching is enabled, the watcher starts here; failing to
  /// watch is an error.
  pub fn build(self) -> Result<TeraViews> {
    let mut functions = FunctionTable::with_builtins(&self.layout_key);
    for (name, function) in self.functions {
      functions.insert_shared(&name, function);
    }
    let state = Arc::new(RwLock::new(StoreState {
      functions,
      ..StoreState::default()
    }));

    let watcher = match self.source.live_root() {
      Some(root) if self.watch => {
        let state = Arc::clone(&state);
        let extension = self.extension.clone();
        Some(TemplateWatcher::start(root, move |_, path| {
          if reload::is_template_family(path, &extension) {
            log::info!("📝 Template change detected: {:?}", path);
            state.write().reload = true;
          }
        })?)
      }
      _ => None,
    };

    let base_name = self.base_name.unwrap_or_else(|| self.source.display_name());
    Ok(TeraViews {
      inner: Arc::new(ViewsInner {
        settings: Settings {
          base_name,
          delimiters: self.delimiters,
          extension: self.extension,
          layout_key: self.layout_key,
          autoescape: self.autoescape,
          configurators: self.configurators,
        },
        source: self.source,
        global_context: self.globals,
        state,
        compile: Mutex::new(()),
        _watcher: Mutex::new(watcher),
      }),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::source::Snapshot;
  use std::collections::HashMap;
  use std::fs;
  use std::sync::OnceLock;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tempfile::tempdir;

  fn snapshot_views(files: &[(&str, &str)]) -> TeraViews {
    let snapshot = Snapshot::from_files(files.iter().map(|(path, body)| (path.to_string(), body.to_string())));
    TeraViews::builder(TemplateSource::snapshot(snapshot)).build().unwrap()
  }

  fn render(views: &TeraViews, name: &str, context: &Context, layout: Option<&str>) -> Result<String> {
    views.render_string(name, context, layout)
  }

  #[test]
  fn test_render_with_binding() {
    let views = snapshot_views(&[("index.html", "Hello, <% user_name %>!")]);
    let mut context = Context::new();
    context.insert("user_name", "Alice");

    assert_eq!(render(&views, "index", &context, None).unwrap(), "Hello, Alice!");
  }

  #[test]
  fn test_name_derivation_strips_extension() {
    let views = snapshot_views(&[("a/b.html", "deep"), ("a/c.txt", "asset")]);
    assert_eq!(views.template_names().unwrap(), vec!["a/b"]);
    assert_eq!(render(&views, "a/b", &Context::new(), None).unwrap(), "deep");
  }

  #[test]
  fn test_user_context_overrides_global_context() {
    let snapshot = Snapshot::from_files([("index.html", "<% site %>: <% title %>")]);
    let views = TeraViews::builder(TemplateSource::snapshot(snapshot))
      .add_global("site", "Ember")
      .add_global("title", "Global Title")
      .build()
      .unwrap();
    let mut context = Context::new();
    context.insert("title", "Page Title");

    assert_eq!(render(&views, "index", &context, None).unwrap(), "Ember: Page Title");
  }

  #[test]
  fn test_layout_wraps_body() {
    let views = snapshot_views(&[("layout.html", "before|<% embed() %>|after"), ("body.html", "X")]);
    assert_eq!(
      render(&views, "body", &Context::new(), Some("layout")).unwrap(),
      "before|X|after"
    );
  }

  #[test]
  fn test_layout_and_body_share_binding() {
    let views = snapshot_views(&[
      ("layouts/main.html", "<title><% title %></title><% embed() %>"),
      ("pages/home.html", "<h1><% title %></h1>"),
    ]);
    let mut context = Context::new();
    context.insert("title", "Home & Away");

    assert_eq!(
      render(&views, "pages/home", &context, Some("layouts/main")).unwrap(),
      "<title>Home &amp; Away</title><h1>Home &amp; Away</h1>"
    );
  }

  #[test]
  fn test_empty_layout_name_means_no_layout() {
    let views = snapshot_views(&[("body.html", "X")]);
    assert_eq!(render(&views, "body", &Context::new(), Some("")).unwrap(), "X");
  }

  #[test]
  fn test_custom_layout_key() {
    let snapshot = Snapshot::from_files([("layout.html", "[<% content() %>]"), ("body.html", "X")]);
    let views = TeraViews::builder(TemplateSource::snapshot(snapshot))
      .layout_key("content")
      .build()
      .unwrap();
    assert_eq!(views.layout_key(), "content");
    assert_eq!(render(&views, "body", &Context::new(), Some("layout")).unwrap(), "[X]");
  }

  #[test]
  fn test_layout_function_outside_render_fails() {
    let views = snapshot_views(&[("layout.html", "before|<% embed() %>|after")]);
    let err = render(&views, "layout", &Context::new(), None).unwrap_err();
    assert!(matches!(err, EmberViewError::LayoutInvokedOutsideRender(ref key) if key == "embed"));
  }

  #[test]
  fn test_missing_template_and_layout() {
    let views = snapshot_views(&[("body.html", "X")]);
    assert!(matches!(
      render(&views, "nope", &Context::new(), None),
      Err(EmberViewError::TemplateNotFound(ref name)) if name == "nope"
    ));
    assert!(matches!(
      render(&views, "body", &Context::new(), Some("layouts/none")),
      Err(EmberViewError::LayoutNotFound(ref name)) if name == "layouts/none"
    ));
  }

  #[test]
  fn test_missing_binding_field_is_execution_error() {
    let views = snapshot_views(&[("index.html", "<% user.name %>")]);
    let err = render(&views, "index", &Context::new(), None).unwrap_err();
    assert!(matches!(err, EmberViewError::TemplateExecution { ref name, .. } if name == "index"));
  }

  #[test]
  fn test_execution_error_names_failing_template() {
    let views = snapshot_views(&[
      ("layout.html", "[<% embed() %>]"),
      ("broken_layout.html", "<% site.title %>[<% embed() %>]"),
      ("body.html", "<% user.name %>"),
      ("plain.html", "ok"),
    ]);

    let err = render(&views, "body", &Context::new(), Some("layout")).unwrap_err();
    assert!(matches!(err, EmberViewError::TemplateExecution { ref name, .. } if name == "body"), "{err:?}");

    let err = render(&views, "plain", &Context::new(), Some("broken_layout")).unwrap_err();
    assert!(matches!(err, EmberViewError::TemplateExecution { ref name, .. } if name == "broken_layout"), "{err:?}");
  }

  #[test]
  fn test_parse_error_names_file_and_retries() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("good.html"), "ok").unwrap();
    fs::write(dir.path().join("broken.html"), "<% if x %>never closed").unwrap();
    let views = TeraViews::builder(TemplateSource::directory(dir.path()).unwrap())
      .watch(false)
      .build()
      .unwrap();

    let err = views.load().unwrap_err();
    assert!(matches!(err, EmberViewError::TemplateParse { ref name, .. } if name == "broken"), "{err:?}");
    assert!(!views.is_loaded());

    fs::write(dir.path().join("broken.html"), "<% if x %>fixed<% endif %>").unwrap();
    assert_eq!(render(&views, "good", &Context::new(), None).unwrap(), "ok");
    assert!(views.is_loaded());
  }

  #[test]
  fn test_unterminated_action_is_parse_error() {
    let views = snapshot_views(&[("bad.html", "<% title")]);
    assert!(matches!(
      views.load(),
      Err(EmberViewError::TemplateParse { ref name, .. }) if name == "bad"
    ));
  }

  #[test]
  fn test_load_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("page.html");
    fs::write(&path, "A").unwrap();
    let views = TeraViews::builder(TemplateSource::directory(dir.path()).unwrap())
      .watch(false)
      .build()
      .unwrap();

    views.load().unwrap();
    fs::write(&path, "B").unwrap();
    views.load().unwrap();

    // Nothing signalled a change, so the source was not read again.
    assert_eq!(render(&views, "page", &Context::new(), None).unwrap(), "A");
    assert_eq!(views.template_names().unwrap(), vec!["page"]);
  }

  #[test]
  fn test_reload_request_recompiles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("page.html");
    fs::write(&path, "A").unwrap();
    let views = TeraViews::builder(TemplateSource::directory(dir.path()).unwrap())
      .watch(false)
      .build()
      .unwrap();
    assert_eq!(render(&views, "page", &Context::new(), None).unwrap(), "A");

    fs::write(&path, "B").unwrap();
    views.request_reload();
    assert!(views.reload_requested());
    assert_eq!(render(&views, "page", &Context::new(), None).unwrap(), "B");
    assert!(!views.reload_requested());
  }

  #[test]
  fn test_reload_requested_during_compile_is_kept() {
    let store: Arc<OnceLock<TeraViews>> = Arc::new(OnceLock::new());
    let compiles = Arc::new(AtomicUsize::new(0));
    let views = {
      let store = Arc::clone(&store);
      let compiles = Arc::clone(&compiles);
      TeraViews::builder(TemplateSource::snapshot(Snapshot::from_files([("page.html", "A")])))
        .configure_tera(move |_| {
          // A change lands while the first compile is still running.
          if compiles.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(views) = store.get() {
              views.request_reload();
            }
          }
        })
        .build()
        .unwrap()
    };
    store.set(views.clone()).unwrap();

    views.load().unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert!(views.is_loaded());
    assert!(views.reload_requested());

    views.load().unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 2);
    assert!(!views.reload_requested());

    views.load().unwrap();
    assert_eq!(compiles.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_register_function_after_load() {
    let views = snapshot_views(&[("index.html", "<% shout(word=\"hi\") %>")]);
    assert!(views.load().is_err() || render(&views, "index", &Context::new(), None).is_err());

    views.register_function("shout", |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
      let word = args.get("word").and_then(|v| v.as_str()).unwrap_or_default();
      Ok(tera::Value::String(word.to_uppercase()))
    });
    assert_eq!(render(&views, "index", &Context::new(), None).unwrap(), "HI");
  }

  #[test]
  fn test_configure_tera_hook() {
    fn upcase_filter(value: &tera::Value, _: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
      let s = tera::from_value::<String>(value.clone())?;
      Ok(tera::to_value(s.to_uppercase()).unwrap())
    }

    let snapshot = Snapshot::from_files([("index.html", "Hello, <% name | upcase %>!")]);
    let views = TeraViews::builder(TemplateSource::snapshot(snapshot))
      .configure_tera(|tera| tera.register_filter("upcase", upcase_filter))
      .build()
      .unwrap();
    let mut context = Context::new();
    context.insert("name", "world");

    assert_eq!(render(&views, "index", &context, None).unwrap(), "Hello, WORLD!");
  }

  #[test]
  fn test_autoescape_can_be_disabled() {
    let files = [("index.html", "<% markup %>")];
    let mut context = Context::new();
    context.insert("markup", "<b>");

    assert_eq!(render(&snapshot_views(&files), "index", &context, None).unwrap(), "&lt;b&gt;");

    let raw = TeraViews::builder(TemplateSource::snapshot(Snapshot::from_files(files)))
      .autoescape(false)
      .build()
      .unwrap();
    assert_eq!(render(&raw, "index", &context, None).unwrap(), "<b>");
  }

  #[test]
  fn test_custom_delimiters_and_extension() {
    let mut context = Context::new();
    context.insert("ok", &true);

    let snapshot = Snapshot::from_files([("index.tera", "[[ if ok ]]yes[[ endif ]]"), ("index.html", "<% oops")]);
    let views = TeraViews::builder(TemplateSource::snapshot(snapshot))
      .delimiters("[[", "]]")
      .extension(".tera")
      .build()
      .unwrap();
    assert_eq!(views.template_names().unwrap(), vec!["index"]);
    assert_eq!(render(&views, "index", &context, None).unwrap(), "yes");

    // Native delimiters are handed to Tera untouched.
    let snapshot = Snapshot::from_files([("index.html", "{% if ok %}{{ word }}{% endif %}")]);
    let views = TeraViews::builder(TemplateSource::snapshot(snapshot))
      .delimiters("{{", "}}")
      .build()
      .unwrap();
    context.insert("word", "native");
    assert_eq!(render(&views, "index", &context, None).unwrap(), "native");
  }

  #[test]
  fn test_render_value_accepts_structs() {
    #[derive(Serialize)]
    struct Page<'a> {
      title: &'a str,
    }

    let views = snapshot_views(&[("index.html", "<% title %>")]);
    let mut out = Vec::new();
    views
      .render_value(&mut out, "index", &Page { title: "Typed" }, None)
      .unwrap();
    assert_eq!(out, b"Typed");

    let err = views.render_value(&mut Vec::new(), "index", &"not a map", None).unwrap_err();
    assert!(matches!(err, EmberViewError::Serialization(_)));
  }

  #[test]
  fn test_concurrent_layout_renders() {
    let views = snapshot_views(&[("layout.html", "[<% embed() %>]"), ("body.html", "<% n %>")]);
    let handles: Vec<_> = (0..8)
      .map(|n| {
        let views = views.clone();
        std::thread::spawn(move || {
          let mut context = Context::new();
          context.insert("n", &n);
          (0..50)
            .map(|_| render(&views, "body", &context, Some("layout")).unwrap())
            .all(|out| out == format!("[{n}]"))
        })
      })
      .collect();
    assert!(handles.into_iter().all(|handle| handle.join().unwrap()));
  }
}
