//! 切面拦截的集中集成测试

use di_abstractions::{
    AdviceSelector, AdvisorDescriptor, AdvisorDescriptorBuilder, Aspect, ClassDescriptor,
    ContainerConfig, Regex,
};
use di_impl::Container;
use infrastructure_common::{
    Arguments, Component, Instance, InvocationContext, MethodError, MethodOutcome, MethodRef,
    ObjectFactory, Scope, Token, ADVISORS_TOKEN,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init()
            .ok();
    });
}

/// 切面回调的记录
#[derive(Default)]
struct Journal {
    events: Mutex<Vec<String>>,
    order: Mutex<Vec<&'static str>>,
    results: Mutex<Vec<Instance>>,
    exceptions: Mutex<Vec<MethodError>>,
}

impl Journal {
    fn count(&self, advice: &str) -> usize {
        self.events.lock().iter().filter(|e| e.as_str() == advice).count()
    }

    fn results(&self) -> Vec<String> {
        self.results.lock().iter().map(text).collect()
    }

    fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().iter().map(ToString::to_string).collect()
    }
}

/// 记录型切面
struct Recorder {
    tag: &'static str,
    journal: Arc<Journal>,
}

impl Component for Recorder {
    fn advise(&self, advice: &str, ctx: &InvocationContext) -> MethodOutcome {
        let journal = &self.journal;
        journal.events.lock().push(advice.to_string());
        match advice {
            "before" => journal.order.lock().push(self.tag),
            "after_returning" => journal.results.lock().push(ctx.result()),
            "after_throws" => journal.exceptions.lock().extend(ctx.exception()),
            "patch" => ctx.set_result(Instance::value(String::from("patched"))),
            "failing" => return MethodOutcome::failed(MethodError::msg("hook failed")),
            "after_async_returning" | "after_async_throws" => {
                let journal = journal.clone();
                let ctx = ctx.clone();
                let returning = advice == "after_async_returning";
                return MethodOutcome::pending(async move {
                    tokio::task::yield_now().await;
                    if returning {
                        journal.results.lock().push(ctx.result());
                    } else {
                        journal.exceptions.lock().extend(ctx.exception());
                    }
                    Ok(Instance::Absent)
                });
            }
            _ => {}
        }
        MethodOutcome::ok(Instance::Absent)
    }
}

/// 被增强的服务
#[derive(Default)]
struct Service {
    calls: AtomicUsize,
}

impl Component for Service {
    fn invoke(&self, method: &str, args: Arguments) -> MethodOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "bar" => MethodOutcome::ok(Instance::value(String::from("bar"))),
            "foo" => MethodOutcome::pending(async {
                tokio::task::yield_now().await;
                Ok(Instance::value(String::from("foo")))
            }),
            "sync_throw" => MethodOutcome::failed(MethodError::msg("throw")),
            "async_reject" => MethodOutcome::pending(async { Err(MethodError::msg("reject")) }),
            "echo" => MethodOutcome::ok(args.get(0).clone()),
            _ => MethodOutcome::failed(MethodError::method_not_found(self.name(), method)),
        }
    }
}

fn text(instance: &Instance) -> String {
    instance
        .downcast::<String>()
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn recorder(tag: &'static str, journal: &Arc<Journal>) -> AdvisorDescriptorBuilder {
    let journal = journal.clone();
    let class = ClassDescriptor::builder(move |_| {
        Ok(Recorder {
            tag,
            journal: journal.clone(),
        })
    })
    .build()
    .unwrap();
    AdvisorDescriptor::builder(class)
}

fn service_container(config: ContainerConfig) -> Container {
    init_test_logger();
    let container = Container::with_config(config);
    container
        .register_class(
            "service",
            ClassDescriptor::builder(|_| Ok(Service::default())).build().unwrap(),
        )
        .unwrap();
    container
}

fn service_of(container: &Container) -> Arc<dyn Component> {
    container
        .resolve(&Token::name("service"))
        .unwrap()
        .as_component()
        .cloned()
        .unwrap()
}

async fn call(service: &Arc<dyn Component>, method: &str) -> Result<Instance, MethodError> {
    service.invoke(method, Arguments::empty()).settle().await
}

#[tokio::test]
async fn test_advice_counts_across_sync_and_async_paths() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    let on_service = || AdviceSelector::any().with_token("service");
    container
        .register_advisor(
            recorder("rec", &journal)
                .advice(Aspect::BeforeMethod, "before", on_service())
                .advice(Aspect::AfterSyncMethodReturning, "after_returning", on_service())
                .advice(Aspect::AfterSyncMethodThrows, "after_throws", on_service())
                .advice(
                    Aspect::AfterAsyncMethodReturning,
                    "after_async_returning",
                    on_service(),
                )
                .advice(Aspect::AfterAsyncMethodThrows, "after_async_throws", on_service())
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    let outcome = service.invoke("bar", Arguments::empty());
    assert!(!outcome.is_pending());
    assert_eq!(text(&outcome.settle().await.unwrap()), "bar");

    let outcome = service.invoke("foo", Arguments::empty());
    assert!(outcome.is_pending());
    assert_eq!(text(&outcome.settle().await.unwrap()), "foo");

    let outcome = service.invoke("sync_throw", Arguments::empty());
    assert!(matches!(outcome, MethodOutcome::Ready(Err(_))));
    assert_eq!(outcome.settle().await.unwrap_err().to_string(), "throw");

    for _ in 0..2 {
        let error = call(&service, "async_reject").await.unwrap_err();
        assert_eq!(error.to_string(), "reject");
    }

    assert_eq!(journal.count("before"), 5);
    assert_eq!(journal.count("after_returning"), 1);
    assert_eq!(journal.count("after_throws"), 1);
    assert_eq!(journal.count("after_async_returning"), 1);
    assert_eq!(journal.count("after_async_throws"), 2);
    assert_eq!(journal.results(), vec!["bar", "foo"]);
    assert_eq!(journal.exceptions(), vec!["throw", "reject", "reject"]);

    let target = Instance::Component(service.clone());
    assert_eq!(
        target.component_ref::<Service>().map(|s| s.calls.load(Ordering::SeqCst)),
        Some(5)
    );
}

#[tokio::test]
async fn test_method_name_pattern_narrows_advice() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_advisor(
            recorder("foo-only", &journal)
                .advice(
                    Aspect::BeforeMethod,
                    "before",
                    AdviceSelector::any().with_method_name_pattern(Regex::new("^foo$").unwrap()),
                )
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    call(&service, "bar").await.unwrap();
    assert_eq!(journal.count("before"), 0);
    call(&service, "foo").await.unwrap();
    assert_eq!(journal.count("before"), 1);
}

#[tokio::test]
async fn test_method_ref_and_class_selectors() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_advisor(
            recorder("typed", &journal)
                .advice(
                    Aspect::BeforeMethod,
                    "bar_only",
                    AdviceSelector::any().with_method(MethodRef::of::<Service>("bar")),
                )
                .advice(
                    Aspect::BeforeMethod,
                    "any_service_method",
                    AdviceSelector::any().with_class::<Service>(),
                )
                .advice(
                    Aspect::BeforeMethod,
                    "wrong_class",
                    AdviceSelector::any().with_class::<Recorder>(),
                )
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    call(&service, "bar").await.unwrap();
    call(&service, "foo").await.unwrap();
    assert_eq!(journal.count("bar_only"), 1);
    assert_eq!(journal.count("any_service_method"), 2);
    assert_eq!(journal.count("wrong_class"), 0);
}

#[tokio::test]
async fn test_advisor_order_is_stable() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    for (tag, order) in [("late", 2), ("early", 1), ("early-second", 1)] {
        container
            .register_advisor(
                recorder(tag, &journal)
                    .order(order)
                    .advice(Aspect::BeforeMethod, "before", AdviceSelector::any())
                    .build(),
            )
            .unwrap();
    }
    let service = service_of(&container);

    call(&service, "bar").await.unwrap();
    assert_eq!(*journal.order.lock(), vec!["early", "early-second", "late"]);
}

#[tokio::test]
async fn test_late_registered_advisor_applies() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_advisor(
            recorder("first", &journal)
                .advice(Aspect::BeforeMethod, "before", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    let service = service_of(&container);
    call(&service, "bar").await.unwrap();

    container
        .register_advisor(
            recorder("second", &journal)
                .advice(Aspect::BeforeMethod, "before", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    call(&service, "bar").await.unwrap();

    assert_eq!(*journal.order.lock(), vec!["first", "first", "second"]);
}

#[tokio::test]
async fn test_returning_hook_can_replace_result() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_advisor(
            recorder("patcher", &journal)
                .advice(Aspect::AfterSyncMethodReturning, "patch", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    assert_eq!(text(&call(&service, "bar").await.unwrap()), "patched");
}

#[tokio::test]
async fn test_hook_errors_never_mask_target_errors() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_advisor(
            recorder("noisy", &journal)
                .advice(Aspect::AfterSyncMethodThrows, "after_throws", AdviceSelector::any())
                .advice(Aspect::AfterSyncMethodThrows, "failing", AdviceSelector::any())
                .advice(Aspect::AfterAsyncMethodThrows, "failing", AdviceSelector::any())
                .advice(Aspect::AfterSyncMethodReturning, "failing", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    let error = call(&service, "sync_throw").await.unwrap_err();
    assert_eq!(error.to_string(), "throw");
    assert!(error.ptr_eq(&journal.exceptions.lock()[0]));

    let error = call(&service, "async_reject").await.unwrap_err();
    assert_eq!(error.to_string(), "reject");

    // 返回路径上回调的错误是唯一可用的错误
    let error = call(&service, "bar").await.unwrap_err();
    assert_eq!(error.to_string(), "hook failed");
}

#[tokio::test]
async fn test_failing_before_hook_skips_target() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_advisor(
            recorder("guard", &journal)
                .advice(Aspect::BeforeMethod, "failing", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    let error = call(&service, "bar").await.unwrap_err();
    assert_eq!(error.to_string(), "hook failed");
    let target = Instance::Component(service);
    assert_eq!(
        target.component_ref::<Service>().map(|s| s.calls.load(Ordering::SeqCst)),
        Some(0)
    );
}

#[tokio::test]
async fn test_factory_advice() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_factory("make", |_| {
            Ok(ObjectFactory::new(|args| {
                MethodOutcome::ok(Instance::value(format!("made-{}", text(args.get(0)))))
            }))
        })
        .unwrap();
    container
        .register_advisor(
            recorder("factory", &journal)
                .advice(
                    Aspect::BeforeFactory,
                    "before",
                    AdviceSelector::any().with_token("make"),
                )
                .advice(
                    Aspect::BeforeFactory,
                    "class_only",
                    AdviceSelector::any().with_class::<Service>(),
                )
                .advice(Aspect::AfterSyncFactoryReturning, "after_returning", AdviceSelector::any())
                .build(),
        )
        .unwrap();

    let factory = container.resolve(&Token::name("make")).unwrap();
    let made = factory
        .as_factory()
        .unwrap()
        .call(vec![Instance::value(String::from("x"))].into())
        .settle()
        .await
        .unwrap();

    assert_eq!(text(&made), "made-x");
    assert_eq!(journal.count("before"), 1);
    assert_eq!(journal.count("class_only"), 0);
    assert_eq!(journal.results(), vec!["made-x"]);

    // 工厂切入点不作用于方法调用
    let service = service_of(&container);
    call(&service, "bar").await.unwrap();
    assert_eq!(journal.count("after_returning"), 1);
}

#[tokio::test]
async fn test_wrapping_rules() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default());
    container
        .register_class_in_scope(
            "scoped",
            ClassDescriptor::builder(|_| Ok(Service::default())).build().unwrap(),
            Scope::Resolution,
        )
        .unwrap();
    container
        .register_advisor(
            recorder("rec", &journal)
                .advice(Aspect::BeforeMethod, "before", AdviceSelector::any())
                .build(),
        )
        .unwrap();

    let first = service_of(&container);
    let second = service_of(&container);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.target_component().is_some());

    let advisors = container.resolve_all(&ADVISORS_TOKEN).unwrap();
    assert_eq!(advisors.len(), 1);
    assert!(advisors[0].as_component().unwrap().target_component().is_none());

    let scoped = container.resolve(&Token::name("scoped")).unwrap();
    assert!(scoped.as_component().unwrap().target_component().is_some());
    assert_eq!(container.stats().live_proxies, 2);
    drop(scoped);
    assert_eq!(container.stats().live_proxies, 1);

    let echoed = first
        .invoke("echo", Arguments::new(vec![Instance::value(String::from("hi"))]))
        .settle()
        .await
        .unwrap();
    assert_eq!(text(&echoed), "hi");
}

#[tokio::test]
async fn test_advice_disabled() {
    let journal = Arc::new(Journal::default());
    let container = service_container(ContainerConfig::default().with_advice(false));
    container
        .register_advisor(
            recorder("rec", &journal)
                .advice(Aspect::BeforeMethod, "before", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    let service = service_of(&container);

    call(&service, "bar").await.unwrap();
    assert!(service.target_component().is_none());
    assert_eq!(journal.count("before"), 0);
}

#[tokio::test]
async fn test_child_does_not_inherit_advisors() {
    let journal = Arc::new(Journal::default());
    let parent = service_container(ContainerConfig::default());
    parent
        .register_advisor(
            recorder("rec", &journal)
                .advice(Aspect::BeforeMethod, "before", AdviceSelector::any())
                .build(),
        )
        .unwrap();
    let child = parent.create_child_container();
    child
        .register_class(
            "local",
            ClassDescriptor::builder(|_| Ok(Service::default())).build().unwrap(),
        )
        .unwrap();

    let local = child.resolve(&Token::name("local")).unwrap();
    assert!(local.as_component().unwrap().target_component().is_none());
    assert!(child.resolve_all(&ADVISORS_TOKEN).unwrap().is_empty());

    // 父容器的实例按父容器的切面包装
    let inherited = service_of(&child);
    call(&inherited, "bar").await.unwrap();
    assert_eq!(journal.count("before"), 1);
}
