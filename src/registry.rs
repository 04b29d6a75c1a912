//! Tool registry - name → tool mapping built once during startup composition.
//!
//! A tool is either `Simple` (one async handler) or `Streaming` (the same
//! handler plus a producer of incremental text fragments). Handlers receive
//! the flat parameter map from the envelope; the typed constructors bind it to
//! a `Deserialize` argument struct before the tool body runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;
use crate::params::{bind, Params};

pub type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;
pub type FragmentStream = BoxStream<'static, Result<String, ToolError>>;

pub type Handler = Arc<dyn Fn(Params) -> ToolFuture + Send + Sync>;

/// Returns `Ok(None)` when incremental production is unavailable for the
/// given parameters; callers then fall back to the handler.
pub type Producer = Arc<dyn Fn(Params) -> Result<Option<FragmentStream>, ToolError> + Send + Sync>;

#[derive(Clone)]
pub enum ToolBody {
    Simple(Handler),
    Streaming(Handler, Producer),
}

pub struct Tool {
    name: String,
    description: String,
    body: ToolBody,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("streaming", &matches!(self.body, ToolBody::Streaming(..)))
            .finish()
    }
}

impl Tool {
    pub fn new(name: &str, description: &str, body: ToolBody) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            body,
        }
    }

    /// Tool with a single typed async entry point.
    pub fn simple<A, R, F, Fut>(name: &str, description: &str, f: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
    {
        Self::new(name, description, ToolBody::Simple(handler(f)))
    }

    /// Tool with a typed async entry point and a typed fragment producer.
    pub fn streaming<A, R, F, Fut, P>(name: &str, description: &str, f: F, produce: P) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
        P: Fn(A) -> Option<FragmentStream> + Send + Sync + 'static,
    {
        Self::new(name, description, ToolBody::Streaming(handler(f), producer(produce)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn body(&self) -> &ToolBody {
        &self.body
    }

    pub fn handler(&self) -> &Handler {
        match &self.body {
            ToolBody::Simple(h) | ToolBody::Streaming(h, _) => h,
        }
    }

    /// Run the tool once to completion.
    pub async fn call(&self, params: Params) -> Result<Value, ToolError> {
        (self.handler())(params).await
    }
}

/// Wrap a typed async function into a [`Handler`].
pub fn handler<A, R, F, Fut>(f: F) -> Handler
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
{
    Arc::new(move |params: Params| -> ToolFuture {
        match bind::<A>(params) {
            Ok(args) => {
                let fut = f(args);
                Box::pin(async move {
                    let out = fut.await?;
                    serde_json::to_value(out)
                        .map_err(|e| ToolError::Failed(format!("result is not serializable: {e}")))
                })
            }
            Err(e) => Box::pin(std::future::ready(Err(e))),
        }
    })
}

/// Wrap a typed fragment producer into a [`Producer`].
pub fn producer<A, P>(produce: P) -> Producer
where
    A: DeserializeOwned + Send + 'static,
    P: Fn(A) -> Option<FragmentStream> + Send + Sync + 'static,
{
    Arc::new(move |params: Params| -> Result<Option<FragmentStream>, ToolError> {
        Ok(produce(bind::<A>(params)?))
    })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second registration under the same name is a
    /// configuration error and leaves the first one in place.
    pub fn register(&mut self, tool: Tool) -> Result<(), RegistryError> {
        if self.tools.contains_key(tool.name()) {
            return Err(RegistryError::Duplicate(tool.name().to_string()));
        }
        tracing::debug!(tool = %tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct EchoArgs {
        text: String,
    }

    fn echo() -> Tool {
        Tool::simple("echo", "Echo text back", |a: EchoArgs| async move {
            Ok::<_, ToolError>(a.text)
        })
    }

    #[test]
    fn list_names_is_sorted() {
        let mut reg = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            reg.register(Tool::simple(name, "", |_: Params| async { Ok::<_, ToolError>(0) }))
                .unwrap();
        }
        assert_eq!(reg.list_names(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = ToolRegistry::new();
        reg.register(echo()).unwrap();
        let err = reg.register(Tool::simple("echo", "other", |_: Params| async {
            Ok::<_, ToolError>(1)
        }));
        assert!(matches!(err, Err(RegistryError::Duplicate(n)) if n == "echo"));
        assert_eq!(reg.resolve("echo").unwrap().description(), "Echo text back");
    }

    #[test]
    fn resolve_returns_the_registered_handler() {
        let h = handler(|a: EchoArgs| async move { Ok::<_, ToolError>(a.text) });
        let mut reg = ToolRegistry::new();
        reg.register(Tool::new("echo", "", ToolBody::Simple(h.clone()))).unwrap();

        let first = reg.resolve("echo").unwrap();
        let second = reg.resolve("echo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.handler(), &h));
        assert!(reg.resolve("missing").is_none());
    }

    #[tokio::test]
    async fn typed_call_binds_parameters() {
        let tool = echo();
        let mut params = Params::new();
        params.insert("text".into(), json!("hi"));
        assert_eq!(tool.call(params).await.unwrap(), json!("hi"));

        let err = tool.call(Params::new()).await.unwrap_err();
        assert!(matches!(&err, ToolError::Params(m) if m.contains("text")));
    }

    #[tokio::test]
    async fn producer_binds_before_streaming() {
        let tool = Tool::streaming(
            "echo",
            "",
            |a: EchoArgs| async move { Ok::<_, ToolError>(a.text) },
            |a: EchoArgs| -> Option<FragmentStream> {
                Some(Box::pin(futures_util::stream::iter(vec![Ok(a.text)])))
            },
        );
        let ToolBody::Streaming(_, produce) = tool.body() else {
            panic!("expected streaming body");
        };
        assert!(matches!(produce(Params::new()), Err(ToolError::Params(_))));
    }
}
