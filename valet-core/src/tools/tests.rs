//! Integration tests for the tools module

use super::*;
use crate::platform::{Platform, SimulatedPlatform};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A simple echo tool for testing
struct EchoTool {
    metadata: ToolMetadata,
}

impl EchoTool {
    fn new() -> Self {
        Self {
            metadata: ToolMetadata::new("echo", "Echoes input back")
                .with_returns("The input message"),
        }
    }
}

#[derive(serde::Deserialize)]
struct EchoArgs {
    message: String,
}

#[async_trait]
impl Tool for EchoTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single("message", "string", "Text to echo")
    }

    async fn invoke(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let args: EchoArgs = parse_args(self.name(), args)?;
        Ok(ToolReply::Text(args.message))
    }
}

/// Panics on every call
struct PanickyTool {
    metadata: ToolMetadata,
}

impl PanickyTool {
    fn new() -> Self {
        Self {
            metadata: ToolMetadata::new("panicky", "Always panics"),
        }
    }
}

#[async_trait]
impl Tool for PanickyTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        panic!("device handle vanished");
    }
}

/// Sleeps for a fixed time, then answers
struct SlowTool {
    metadata: ToolMetadata,
    delay: Duration,
}

impl SlowTool {
    fn new(delay: Duration) -> Self {
        Self {
            metadata: ToolMetadata::new("slow", "Takes its time"),
            delay,
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolReply::text("done"))
    }
}

/// Records when each invocation body starts
struct StampTool {
    metadata: ToolMetadata,
    starts: Mutex<Vec<Instant>>,
}

impl StampTool {
    fn new(interval: Duration) -> Self {
        Self {
            metadata: ToolMetadata::new("stamp", "Records start times")
                .with_min_interval(interval),
            starts: Mutex::new(Vec::new()),
        }
    }

    fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StampTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        self.starts.lock().unwrap().push(Instant::now());
        Ok(ToolReply::text("stamped"))
    }
}

/// Needs window management
struct WindowsOnlyTool {
    metadata: ToolMetadata,
}

#[async_trait]
impl Tool for WindowsOnlyTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        Ok(ToolReply::text("should not run"))
    }
}

#[tokio::test]
async fn test_echo_tool_success() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let outcome = runtime
        .execute(&EchoTool::new(), json!({"message": "hello"}), &ToolContext::new())
        .await;

    assert_eq!(outcome.reply, ToolReply::text("hello"));
    assert!(outcome.record.outcome.is_success());
    assert_eq!(outcome.record.tool_name, "echo");
}

#[tokio::test]
async fn test_bad_arguments_become_reply() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let outcome = runtime
        .execute(&EchoTool::new(), json!({"msg": 1}), &ToolContext::new())
        .await;

    let text = outcome.reply.as_text().unwrap();
    assert!(text.starts_with("Invalid arguments for echo:"), "{}", text);
    assert_eq!(
        outcome.record.outcome,
        InvocationOutcome::Failed {
            kind: ToolErrorKind::Validation
        }
    );
}

#[tokio::test]
async fn test_panic_is_contained() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let outcome = runtime
        .execute(&PanickyTool::new(), Value::Null, &ToolContext::new())
        .await;

    assert_eq!(
        outcome.reply.as_text(),
        Some("Error in panicky: device handle vanished")
    );
    assert_eq!(outcome.record.outcome, InvocationOutcome::Panicked);

    // The runtime keeps serving calls afterwards
    let reply = runtime
        .invoke(&EchoTool::new(), json!({"message": "still here"}), &ToolContext::new())
        .await;
    assert_eq!(reply.as_text(), Some("still here"));
}

#[tokio::test]
async fn test_panic_inside_platform_call_is_contained() {
    struct BlockingPanic {
        metadata: ToolMetadata,
        env: Arc<ToolEnvironment>,
    }

    #[async_trait]
    impl Tool for BlockingPanic {
        fn metadata(&self) -> &ToolMetadata {
            &self.metadata
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::empty()
        }

        async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
            let lease = self.env.acquire(ResourceClass::Display).await;
            let value: u8 = self.env.offload(&lease, |_| panic!("driver crashed")).await?;
            Ok(ToolReply::Text(value.to_string()))
        }
    }

    let env = Arc::new(ToolEnvironment::new(Platform::unsupported()));
    let tool = BlockingPanic {
        metadata: ToolMetadata::new("blocking_panic", "Panics on the blocking pool"),
        env,
    };
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let outcome = runtime.execute(&tool, Value::Null, &ToolContext::new()).await;

    assert_eq!(
        outcome.reply.as_text(),
        Some("Error in blocking_panic: driver crashed")
    );
    assert_eq!(outcome.record.outcome, InvocationOutcome::Panicked);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_becomes_reply() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default().with_tool_timeout("slow", Duration::from_secs(2)));
    let outcome = runtime
        .execute(&SlowTool::new(Duration::from_secs(60)), Value::Null, &ToolContext::new())
        .await;

    assert_eq!(outcome.reply.as_text(), Some("Error in slow: timed out after 2s"));
    assert_eq!(outcome.record.outcome, InvocationOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_call() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let token = CancellationToken::new();
    let ctx = ToolContext::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let outcome = runtime
        .execute(&SlowTool::new(Duration::from_secs(10)), Value::Null, &ctx)
        .await;
    canceller.await.unwrap();

    assert_eq!(outcome.reply.as_text(), Some("Error in slow: cancelled"));
    assert_eq!(outcome.record.outcome, InvocationOutcome::Cancelled);
    assert!(outcome.record.duration < Duration::from_secs(1));
}

#[tokio::test]
async fn test_already_cancelled_never_runs() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let token = CancellationToken::new();
    token.cancel();
    let stamp = StampTool::new(Duration::ZERO);

    let outcome = runtime
        .execute(&stamp, Value::Null, &ToolContext::new().with_cancellation(token))
        .await;

    assert_eq!(outcome.record.outcome, InvocationOutcome::Cancelled);
    assert!(stamp.starts().is_empty());
}

#[tokio::test]
async fn test_missing_capability_uses_fixed_message() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default())
        .with_capabilities(CapabilitySet::from_capabilities([Capability::Audio]));

    let with_message = WindowsOnlyTool {
        metadata: ToolMetadata::new("tiling", "Tile windows").with_capability(
            Capability::WindowManagement,
            "Window management not available on this system",
        ),
    };
    let outcome = runtime
        .execute(&with_message, Value::Null, &ToolContext::new())
        .await;
    assert_eq!(
        outcome.reply.as_text(),
        Some("Window management not available on this system")
    );
    assert_eq!(outcome.record.outcome, InvocationOutcome::Unavailable);

    let mut without_message = WindowsOnlyTool {
        metadata: ToolMetadata::new("tiling", "Tile windows"),
    };
    without_message.metadata.capability = Some(Capability::WindowManagement);
    let reply = runtime
        .invoke(&without_message, Value::Null, &ToolContext::new())
        .await;
    assert_eq!(reply.as_text(), Some("tiling is not available on this system"));
}

#[tokio::test(start_paused = true)]
async fn test_min_interval_spaces_invocations() {
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());
    let stamp = StampTool::new(Duration::from_millis(200));

    for _ in 0..4 {
        runtime.invoke(&stamp, Value::Null, &ToolContext::new()).await;
    }

    let starts = stamp.starts();
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(200));
    }
}

#[tokio::test(start_paused = true)]
async fn test_config_override_disables_interval() {
    let runtime = ToolRuntime::new(
        ToolRuntimeConfig::default().with_rate_limit("stamp", Duration::ZERO),
    );
    let stamp = StampTool::new(Duration::from_secs(5));

    let began = Instant::now();
    for _ in 0..3 {
        runtime.invoke(&stamp, Value::Null, &ToolContext::new()).await;
    }
    assert!(began.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_respect_interval() {
    let runtime = Arc::new(ToolRuntime::new(ToolRuntimeConfig::default()));
    let stamp = Arc::new(StampTool::new(Duration::from_millis(300)));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let runtime = runtime.clone();
            let stamp = stamp.clone();
            tokio::spawn(async move {
                runtime
                    .invoke(stamp.as_ref(), Value::Null, &ToolContext::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut starts = stamp.starts();
    starts.sort();
    assert_eq!(starts.len(), 6);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(300));
    }
}

#[tokio::test]
async fn test_dispatch_inactive_tool() {
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool::new()), Arc::new(PanickyTool::new())];
    let registry = ToolRegistry::new(tools, ["echo"]).unwrap();
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default());

    let outcome = runtime
        .dispatch(&registry, "panicky", Value::Null, &ToolContext::new())
        .await;
    assert_eq!(outcome.reply.as_text(), Some("Tool 'panicky' is not available"));
    assert_eq!(outcome.record.outcome, InvocationOutcome::Unavailable);

    let outcome = runtime
        .dispatch(&registry, "teleport", Value::Null, &ToolContext::new())
        .await;
    assert_eq!(outcome.reply.as_text(), Some("Tool 'teleport' is not available"));

    let outcome = runtime
        .dispatch(&registry, "echo", json!({"message": "hi"}), &ToolContext::new())
        .await;
    assert_eq!(outcome.reply.as_text(), Some("hi"));
}

#[tokio::test]
async fn test_unavailable_platform_gives_fixed_messages() {
    let sim = SimulatedPlatform::unavailable();
    let env = Arc::new(ToolEnvironment::new(sim.platform()));
    assert!(env.capabilities().is_empty());

    let registry = ToolRegistry::builtin(env.clone(), None).unwrap();
    let runtime = ToolRuntime::new(ToolRuntimeConfig::default())
        .with_capabilities(env.capabilities().clone());

    let expected = [
        ("set_volume", json!({"level": 30}), "Audio controls not available on this system"),
        ("get_volume", Value::Null, "Audio controls not available on this system"),
        ("mute_audio", Value::Null, "Audio controls not available on this system"),
        ("set_brightness", json!({"brightness": 30}), "Display controls not available on this system"),
        ("get_brightness", Value::Null, "Display controls not available on this system"),
        ("screenshot", Value::Null, "Screenshot functionality not available on this system"),
        ("screen_resolution", Value::Null, "Display information not available on this system"),
        ("minimize_windows", Value::Null, "Window management not available on this system"),
        ("switch_app", json!({"app_name": "term"}), "Application switching not available on this system"),
    ];

    for (name, args, message) in expected {
        let outcome = runtime
            .dispatch(&registry, name, args, &ToolContext::new())
            .await;
        assert_eq!(outcome.reply.as_text(), Some(message), "{}", name);
        assert_eq!(outcome.record.outcome, InvocationOutcome::Unavailable);
    }

    let active_window = registry.get("active_window").unwrap();
    let reply = runtime
        .invoke(active_window.as_ref(), Value::Null, &ToolContext::new())
        .await;
    assert_eq!(
        reply.as_text(),
        Some("Window information not available on this system")
    );

    // Nothing reached the platform
    for op in ["set_volume", "volume", "set_muted", "brightness", "capture", "list_windows"] {
        assert_eq!(sim.attempts(op), 0, "{}", op);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_windows_tools_never_interleave() {
    let sim = SimulatedPlatform::new();
    sim.set_latency(Duration::from_millis(20));
    let env = Arc::new(ToolEnvironment::new(sim.platform()));
    let registry = Arc::new(
        ToolRegistry::builtin(
            env.clone(),
            Some(&["switch_app".to_string(), "active_window".to_string()]),
        )
        .unwrap(),
    );
    let runtime = Arc::new(
        ToolRuntime::new(ToolRuntimeConfig::default().with_rate_limit("switch_app", Duration::ZERO))
            .with_capabilities(env.capabilities().clone()),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            let runtime = runtime.clone();
            tokio::spawn(async move {
                let (name, args) = if i % 2 == 0 {
                    ("switch_app", json!({"app_name": "code"}))
                } else {
                    ("active_window", Value::Null)
                };
                runtime
                    .dispatch(&registry, name, args, &ToolContext::new())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.record.outcome.is_success(), "{:?}", outcome.reply);
    }

    assert_eq!(sim.violations(), 0);
    assert_eq!(sim.focused_window().as_deref(), Some("Visual Studio Code"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_audio_calls_balance_bindings() {
    let sim = SimulatedPlatform::new();
    sim.set_latency(Duration::from_millis(5));
    let env = Arc::new(ToolEnvironment::new(sim.platform()));
    let registry = Arc::new(ToolRegistry::builtin(env.clone(), None).unwrap());
    let runtime = Arc::new(ToolRuntime::new(ToolRuntimeConfig::default()));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let registry = registry.clone();
            let runtime = runtime.clone();
            tokio::spawn(async move {
                runtime
                    .dispatch(&registry, "set_volume", json!({"level": i * 10}), &ToolContext::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let (established, released) = sim.binding_counts();
    assert_eq!(established, 10);
    assert_eq!(established, released);
    assert_eq!(sim.violations(), 0);
}
