//! JavaScript engine adapter built on boa
//!
//! Grants decide which host bindings a context receives:
//! - `console` is always bound to the output multiplexer
//! - `process.env` is populated only with inherited environment access
//! - `fs` exists only with full I/O access
//! - `host` exists only with host access; `host.type` honours the class
//!   lookup predicate

use std::sync::Arc;

use boa_engine::object::ObjectInitializer;
use boa_gc::{Finalize, Trace};
use boa_engine::property::Attribute;
use boa_engine::{
    Context, JsArgs, JsError, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source,
};
use tracing::debug;

use super::{
    CapabilityGrants, EngineContext, EnvironmentAccess, HostAccess, HostClassLookup, IoAccess,
    NativeShape, ScriptEngine, ValueHandle,
};
use crate::error::ScriptError;
use crate::runner::output::OutputMultiplexer;

pub const ENGINE_NAME: &str = "boa";
pub const ENGINE_VERSION: &str = "0.20";
pub const JS_LANGUAGE: &str = "js";

/// Arrays longer than this are rendered as text instead of converted
const MAX_SEQUENCE_LEN: u64 = 1_000_000;

/// Engine adapter for the `js` language
#[derive(Debug, Clone, Default)]
pub struct BoaEngine;

impl BoaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for BoaEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn version(&self) -> &str {
        ENGINE_VERSION
    }

    fn languages(&self) -> Vec<String> {
        vec![JS_LANGUAGE.to_string()]
    }

    fn create_context(
        &self,
        grants: &CapabilityGrants,
        output: Arc<OutputMultiplexer>,
    ) -> Result<Box<dyn EngineContext>, ScriptError> {
        let mut context = Context::default();

        install_console(&mut context, output).map_err(context_build_error)?;
        install_process(&mut context, grants.environment).map_err(context_build_error)?;

        if grants.io == IoAccess::All {
            install_fs(&mut context).map_err(context_build_error)?;
        }
        if grants.host_access == HostAccess::All {
            install_host(&mut context, grants.host_class_lookup).map_err(context_build_error)?;
        }
        if grants.create_thread {
            debug!("Thread creation granted; boa evaluates on the calling thread only");
        }

        debug!("Created boa context with grants {:?}", grants);

        Ok(Box::new(BoaContext {
            context,
            values: Vec::new(),
        }))
    }
}

/// A boa realm plus the values handed out to the runner
struct BoaContext {
    context: Context,
    values: Vec<JsValue>,
}

impl BoaContext {
    fn store(&mut self, value: JsValue) -> ValueHandle {
        self.values.push(value);
        ValueHandle(self.values.len() - 1)
    }

    fn value(&self, handle: ValueHandle) -> Result<JsValue, ScriptError> {
        self.values
            .get(handle.0)
            .cloned()
            .ok_or_else(|| ScriptError::Internal(anyhow::anyhow!("Stale value handle {}", handle.0)))
    }

    fn ensure_language(&self, language: &str) -> Result<(), ScriptError> {
        if language == JS_LANGUAGE {
            Ok(())
        } else {
            Err(ScriptError::UnsupportedLanguage {
                language: language.to_string(),
                available: vec![JS_LANGUAGE.to_string()],
            })
        }
    }

    /// Drain pending promise jobs so `.then` callbacks run before conversion
    fn run_jobs(&mut self) {
        let _ = self.context.run_jobs();
    }

    /// let/const/class bindings are not properties of the global object
    fn lookup_lexical(&mut self, name: &str) -> Option<JsValue> {
        if !is_identifier(name) {
            return None;
        }
        let expr = format!("typeof {0} === 'undefined' ? undefined : {0}", name);
        self.context
            .eval(Source::from_bytes(expr.as_bytes()))
            .ok()
            .filter(|value| !value.is_undefined())
    }
}

impl EngineContext for BoaContext {
    fn eval(&mut self, language: &str, source: &str) -> Result<ValueHandle, ScriptError> {
        self.ensure_language(language)?;
        let value = self
            .context
            .eval(Source::from_bytes(source.as_bytes()))
            .map_err(evaluation_error)?;
        self.run_jobs();
        Ok(self.store(value))
    }

    fn lookup_member(
        &mut self,
        language: &str,
        name: &str,
    ) -> Result<Option<ValueHandle>, ScriptError> {
        self.ensure_language(language)?;

        let global = self.context.global_object();
        let key = JsString::from(name);
        let found = global
            .has_property(key.clone(), &mut self.context)
            .map_err(evaluation_error)?;

        let value = if found {
            Some(global.get(key, &mut self.context).map_err(evaluation_error)?)
        } else {
            self.lookup_lexical(name)
        };

        Ok(value.map(|v| self.store(v)))
    }

    fn can_execute(&self, value: ValueHandle) -> bool {
        self.values
            .get(value.0)
            .map(|v| v.is_callable())
            .unwrap_or(false)
    }

    fn invoke(
        &mut self,
        callable: ValueHandle,
        args: &[serde_json::Value],
    ) -> Result<ValueHandle, ScriptError> {
        let target = self.value(callable)?;
        let function = target
            .as_callable()
            .ok_or_else(|| ScriptError::evaluation("TypeError", "value is not callable"))?
            .clone();

        let mut js_args = Vec::with_capacity(args.len());
        for arg in args {
            js_args.push(JsValue::from_json(arg, &mut self.context).map_err(evaluation_error)?);
        }

        let result = function
            .call(&JsValue::undefined(), &js_args, &mut self.context)
            .map_err(evaluation_error)?;
        self.run_jobs();
        Ok(self.store(result))
    }

    fn inspect(&mut self, handle: ValueHandle) -> Result<NativeShape, ScriptError> {
        let value = self.value(handle)?;

        if value.is_null_or_undefined() {
            return Ok(NativeShape::Null);
        }
        if let Some(b) = value.as_boolean() {
            return Ok(NativeShape::Boolean(b));
        }
        if let Some(n) = value.as_number() {
            return Ok(NativeShape::Float(n));
        }
        if let Some(big) = value.as_bigint() {
            let text = big.to_string();
            return Ok(match text.parse::<i64>() {
                Ok(i) => NativeShape::Integer(i),
                Err(_) => NativeShape::Structured(text),
            });
        }
        if let Some(s) = value.as_string() {
            return Ok(NativeShape::String(s.to_std_string_escaped()));
        }

        if let Some(object) = value.as_object() {
            if object.is_array() {
                let len = object
                    .get(JsString::from("length"), &mut self.context)
                    .and_then(|l| l.to_length(&mut self.context))
                    .map_err(evaluation_error)?;
                if len <= MAX_SEQUENCE_LEN {
                    return Ok(NativeShape::Sequence(len as usize));
                }
            }
        }

        Ok(NativeShape::Structured(value.display().to_string()))
    }

    fn element(&mut self, sequence: ValueHandle, index: usize) -> Result<ValueHandle, ScriptError> {
        let value = self.value(sequence)?;
        let object = value.as_object().ok_or_else(|| {
            ScriptError::Internal(anyhow::anyhow!("Value handle {} is not a sequence", sequence.0))
        })?;
        let index = u32::try_from(index)
            .map_err(|_| ScriptError::Internal(anyhow::anyhow!("Index {} out of range", index)))?;
        let element = object
            .get(index, &mut self.context)
            .map_err(evaluation_error)?;
        Ok(self.store(element))
    }

    fn same_value(&self, a: ValueHandle, b: ValueHandle) -> bool {
        match (self.values.get(a.0), self.values.get(b.0)) {
            (Some(a), Some(b)) => a.strict_equals(b),
            _ => false,
        }
    }

    fn dispose(mut self: Box<Self>) {
        debug!("Disposing boa context ({} values)", self.values.len());
        self.values.clear();
    }
}

fn evaluation_error(err: JsError) -> ScriptError {
    ScriptError::evaluation("Error", err.to_string())
}

fn context_build_error(err: JsError) -> ScriptError {
    ScriptError::ContextBuild(err.to_string())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Render console arguments the way a terminal console does
fn console_line(args: &[JsValue]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| match arg.as_string() {
            Some(s) => s.to_std_string_escaped(),
            None => arg.display().to_string(),
        })
        .collect();
    let mut line = parts.join(" ");
    line.push('\n');
    line
}

/// Output handle captured by the console functions
#[derive(Trace, Finalize)]
struct ConsoleSink {
    #[unsafe_ignore_trace]
    output: Arc<OutputMultiplexer>,
}

fn console_method(output: Arc<OutputMultiplexer>) -> NativeFunction {
    NativeFunction::from_copy_closure_with_captures(
        |_this, args, sink: &ConsoleSink, _ctx| {
            sink.output.write(&console_line(args));
            Ok(JsValue::undefined())
        },
        ConsoleSink { output },
    )
}

fn install_console(context: &mut Context, output: Arc<OutputMultiplexer>) -> JsResult<()> {
    let console = ObjectInitializer::new(context)
        .function(console_method(output.clone()), JsString::from("log"), 0)
        .function(console_method(output.clone()), JsString::from("info"), 0)
        .function(console_method(output.clone()), JsString::from("debug"), 0)
        .function(console_method(output.clone()), JsString::from("warn"), 0)
        .function(console_method(output), JsString::from("error"), 0)
        .build();
    context.register_global_property(JsString::from("console"), console, Attribute::all())
}

fn install_process(context: &mut Context, environment: EnvironmentAccess) -> JsResult<()> {
    let env = ObjectInitializer::new(context).build();
    if environment == EnvironmentAccess::Inherit {
        for (key, value) in std::env::vars() {
            env.set(
                JsString::from(key.as_str()),
                JsString::from(value.as_str()),
                false,
                context,
            )?;
        }
    }
    let process = ObjectInitializer::new(context)
        .property(JsString::from("env"), env, Attribute::all())
        .build();
    context.register_global_property(JsString::from("process"), process, Attribute::all())
}

fn fs_read_file(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let path = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(JsValue::from(JsString::from(content.as_str()))),
        Err(e) => Err(JsNativeError::error()
            .with_message(format!("readFile '{}': {}", path, e))
            .into()),
    }
}

fn fs_write_file(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let path = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
    let content = args.get_or_undefined(1).to_string(ctx)?.to_std_string_escaped();
    match std::fs::write(&path, content) {
        Ok(()) => Ok(JsValue::undefined()),
        Err(e) => Err(JsNativeError::error()
            .with_message(format!("writeFile '{}': {}", path, e))
            .into()),
    }
}

fn fs_exists(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let path = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
    Ok(JsValue::from(std::path::Path::new(&path).exists()))
}

fn install_fs(context: &mut Context) -> JsResult<()> {
    let fs = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(fs_read_file), JsString::from("readFile"), 1)
        .function(NativeFunction::from_fn_ptr(fs_write_file), JsString::from("writeFile"), 2)
        .function(NativeFunction::from_fn_ptr(fs_exists), JsString::from("exists"), 1)
        .build();
    context.register_global_property(JsString::from("fs"), fs, Attribute::all())
}

fn host_platform(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::from(JsString::from(std::env::consts::OS)))
}

fn host_pid(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::from(std::process::id()))
}

fn install_host(context: &mut Context, lookup: HostClassLookup) -> JsResult<()> {
    let host_type = NativeFunction::from_copy_closure(move |_this, args, ctx| {
        let name = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
        if !lookup.permits(&name) {
            return Err(JsNativeError::typ()
                .with_message(format!("Access to host class {} is not allowed", name))
                .into());
        }
        Err(JsNativeError::typ()
            .with_message(format!("Host class {} not found", name))
            .into())
    });

    let host = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(host_platform), JsString::from("platform"), 0)
        .function(NativeFunction::from_fn_ptr(host_pid), JsString::from("pid"), 0)
        .function(host_type, JsString::from("type"), 1)
        .build();
    context.register_global_property(JsString::from("host"), host, Attribute::all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PermissionProfile;

    fn context_for(profile: PermissionProfile) -> (Box<dyn EngineContext>, Arc<OutputMultiplexer>) {
        let output = Arc::new(OutputMultiplexer::new(None));
        let grants = CapabilityGrants::from_profile(&profile);
        let ctx = BoaEngine::new()
            .create_context(&grants, output.clone())
            .unwrap();
        (ctx, output)
    }

    fn eval_shape(ctx: &mut Box<dyn EngineContext>, source: &str) -> NativeShape {
        let handle = ctx.eval(JS_LANGUAGE, source).unwrap();
        ctx.inspect(handle).unwrap()
    }

    #[test]
    fn test_eval_arithmetic() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        assert_eq!(eval_shape(&mut ctx, "1 + 2 + 3"), NativeShape::Float(6.0));
        ctx.dispose();
    }

    #[test]
    fn test_console_writes_to_output() {
        let (mut ctx, output) = context_for(PermissionProfile::sandbox());
        ctx.eval(JS_LANGUAGE, "console.log('hello', 42); console.error('oops')")
            .unwrap();
        assert_eq!(output.transcript(), "hello 42\noops\n");
    }

    #[test]
    fn test_lookup_function_and_invoke() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        ctx.eval(JS_LANGUAGE, "function add(a, b) { return a + b; }")
            .unwrap();
        let add = ctx.lookup_member(JS_LANGUAGE, "add").unwrap().unwrap();
        assert!(ctx.can_execute(add));
        let result = ctx
            .invoke(add, &[serde_json::json!(10), serde_json::json!(20)])
            .unwrap();
        assert_eq!(ctx.inspect(result).unwrap(), NativeShape::Float(30.0));
    }

    #[test]
    fn test_lookup_lexical_binding() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        ctx.eval(JS_LANGUAGE, "const twice = (x) => x * 2;").unwrap();
        let twice = ctx.lookup_member(JS_LANGUAGE, "twice").unwrap().unwrap();
        assert!(ctx.can_execute(twice));
    }

    #[test]
    fn test_lookup_missing_member() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        ctx.eval(JS_LANGUAGE, "var x = 1;").unwrap();
        assert!(ctx.lookup_member(JS_LANGUAGE, "nope").unwrap().is_none());
        assert!(ctx.lookup_member(JS_LANGUAGE, "not an ident").unwrap().is_none());
        let x = ctx.lookup_member(JS_LANGUAGE, "x").unwrap().unwrap();
        assert!(!ctx.can_execute(x));
    }

    #[test]
    fn test_syntax_error_is_evaluation_error() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        let err = ctx.eval(JS_LANGUAGE, "function (").unwrap_err();
        assert_eq!(err.kind(), "EvaluationError");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_thrown_error_message() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        let err = ctx
            .eval(JS_LANGUAGE, "throw new TypeError('bad input')")
            .unwrap_err();
        assert!(err.to_string().contains("bad input"));
    }

    #[test]
    fn test_array_shape() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        let handle = ctx.eval(JS_LANGUAGE, "[1, 'a', true]").unwrap();
        assert_eq!(ctx.inspect(handle).unwrap(), NativeShape::Sequence(3));
        let second = ctx.element(handle, 1).unwrap();
        assert_eq!(ctx.inspect(second).unwrap(), NativeShape::String("a".into()));
    }

    #[test]
    fn test_same_value_is_identity() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        let outer = ctx.eval(JS_LANGUAGE, "var a = [0]; [a, a, [0]]").unwrap();
        let first = ctx.element(outer, 0).unwrap();
        let second = ctx.element(outer, 1).unwrap();
        let third = ctx.element(outer, 2).unwrap();
        assert!(ctx.same_value(first, second));
        assert!(!ctx.same_value(first, third));
        assert!(!ctx.same_value(outer, first));
    }

    #[test]
    fn test_object_is_structured() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        match eval_shape(&mut ctx, "({a: 1})") {
            NativeShape::Structured(text) => assert!(text.contains('a')),
            other => panic!("expected structured, got {:?}", other),
        }
    }

    #[test]
    fn test_sandbox_has_no_host_bindings() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        assert_eq!(
            eval_shape(&mut ctx, "typeof fs + ',' + typeof host"),
            NativeShape::String("undefined,undefined".into())
        );
        assert_eq!(
            eval_shape(&mut ctx, "Object.keys(process.env).length"),
            NativeShape::Float(0.0)
        );
    }

    #[test]
    fn test_permissive_installs_host_bindings() {
        let (mut ctx, _) = context_for(PermissionProfile::permissive());
        assert_eq!(
            eval_shape(&mut ctx, "typeof fs.readFile + ',' + typeof host.platform"),
            NativeShape::String("function,function".into())
        );
    }

    #[test]
    fn test_host_class_lookup_denied_without_network() {
        let profile = PermissionProfile {
            allow_host_access: true,
            ..PermissionProfile::sandbox()
        };
        let (mut ctx, _) = context_for(profile);
        let err = ctx.eval(JS_LANGUAGE, "host.type('java.io.File')").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn test_other_language_rejected() {
        let (mut ctx, _) = context_for(PermissionProfile::sandbox());
        let err = ctx.eval("python", "1").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedLanguage");
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("main"));
        assert!(is_identifier("_run$1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
