use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::injectable::{Arguments, Constructor, Injectable};
use super::{Lifetime, ServiceArc, Token};
use crate::error::{ContainerError, ContainerResult};

struct Binding {
    constructor: Constructor,
    lifetime: Lifetime,
    /// Held while a singleton is being built so concurrent first resolves
    /// construct at most one instance.
    construction: Mutex<()>,
}

/// Tokens currently being built on this call path, outermost first.
#[derive(Default)]
pub(crate) struct Resolution {
    chain: Vec<Token>,
}

impl Resolution {
    fn contains(&self, token: &Token) -> bool {
        self.chain.contains(token)
    }

    fn cycle(&self, token: &Token) -> ContainerError {
        let mut names: Vec<&str> = self.chain.iter().map(Token::name).collect();
        names.push(token.name());
        ContainerError::CircularDependency(names.join(" -> "))
    }
}

/// The service container.
///
/// Safe to share across tasks; every method takes `&self`.
#[derive(Default)]
pub struct Container {
    bindings: RwLock<HashMap<Token, Arc<Binding>>>,
    instances: RwLock<HashMap<Token, ServiceArc>>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Registration ─────────────────────────────────────────────────────────

    /// Registers `T` as a transient service under `token`.
    pub fn bind<T: Injectable>(&self, token: impl Into<Token>) {
        self.bind_with(token, Constructor::of::<T>(), Lifetime::Transient);
    }

    /// Registers `T` as a singleton service under `token`.
    pub fn singleton<T: Injectable>(&self, token: impl Into<Token>) {
        self.bind_with(token, Constructor::of::<T>(), Lifetime::Singleton);
    }

    /// Registers an arbitrary constructor.
    ///
    /// Re-registering a token replaces the previous binding and drops any
    /// instance cached for it.
    pub fn bind_with(&self, token: impl Into<Token>, constructor: Constructor, lifetime: Lifetime) {
        let token = token.into();
        debug!(
            token = %token,
            implementation = constructor.type_name(),
            ?lifetime,
            "Binding service"
        );

        let binding = Arc::new(Binding {
            constructor,
            lifetime,
            construction: Mutex::new(()),
        });
        self.instances.write().remove(&token);
        self.bindings.write().insert(token, binding);
    }

    /// Seeds the singleton cache with a pre-built value.
    pub fn instance<T: Send + Sync + 'static>(&self, token: impl Into<Token>, value: T) {
        self.instance_arc(token, Arc::new(value));
    }

    /// Seeds the singleton cache with an already shared value.
    pub fn instance_arc<T: Send + Sync + 'static>(&self, token: impl Into<Token>, value: Arc<T>) {
        let token = token.into();
        trace!(token = %token, "Registering instance");
        self.instances.write().insert(token, value);
    }

    /// Returns `true` if a binding or a cached instance exists for `token`.
    pub fn has(&self, token: impl Into<Token>) -> bool {
        let token = token.into();
        self.instances.read().contains_key(&token) || self.bindings.read().contains_key(&token)
    }

    /// Removes both the binding and any cached instance for `token`.
    pub fn forget(&self, token: impl Into<Token>) {
        let token = token.into();
        self.instances.write().remove(&token);
        self.bindings.write().remove(&token);
    }

    /// Drops every cached singleton while keeping the bindings.
    pub fn flush(&self) {
        self.instances.write().clear();
    }

    /// Every token known to the container.
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.bindings.read().keys().cloned().collect();
        for token in self.instances.read().keys() {
            if !tokens.contains(token) {
                tokens.push(token.clone());
            }
        }
        tokens
    }

    // ─── Resolution ───────────────────────────────────────────────────────────

    /// Resolves the service registered under `token` as `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> ContainerResult<Arc<T>> {
        let token = token.into();
        self.resolve_any(&token)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                token: token.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolves the service registered under `token` without downcasting.
    pub fn resolve_any(&self, token: impl Into<Token>) -> ContainerResult<ServiceArc> {
        let token = token.into();
        self.resolve_in(&token, &mut Resolution::default())
    }

    /// Builds a fresh `T`, resolving its declared dependencies.
    ///
    /// The result is never cached, regardless of any binding for `T`.
    pub fn make<T: Injectable>(&self) -> ContainerResult<T> {
        let token = Token::of::<T>();
        let mut resolution = Resolution::default();
        resolution.chain.push(token);
        let args = self.collect(&Constructor::of::<T>(), &mut resolution)?;
        T::construct(args)
    }

    pub(crate) fn resolve_in(
        &self,
        token: &Token,
        resolution: &mut Resolution,
    ) -> ContainerResult<ServiceArc> {
        if let Some(instance) = self.instances.read().get(token) {
            return Ok(Arc::clone(instance));
        }

        let binding = self
            .bindings
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| ContainerError::ServiceNotFound(token.to_string()))?;

        match binding.lifetime {
            Lifetime::Transient => self.build(token, &binding.constructor, resolution),
            Lifetime::Singleton => {
                // Re-entering the lock below would deadlock instead of reporting the cycle.
                if resolution.contains(token) {
                    return Err(resolution.cycle(token));
                }

                let _guard = binding.construction.lock();
                if let Some(instance) = self.instances.read().get(token) {
                    return Ok(Arc::clone(instance));
                }

                let instance = self.build(token, &binding.constructor, resolution)?;

                // A rebind while we were building wins over our result.
                let current = self
                    .bindings
                    .read()
                    .get(token)
                    .is_some_and(|b| Arc::ptr_eq(b, &binding));
                if current {
                    self.instances
                        .write()
                        .insert(token.clone(), Arc::clone(&instance));
                    debug!(token = %token, "Singleton constructed");
                }
                Ok(instance)
            }
        }
    }

    pub(crate) fn make_erased<D: Injectable>(
        &self,
        resolution: &mut Resolution,
    ) -> ContainerResult<ServiceArc> {
        self.build(&Token::of::<D>(), &Constructor::of::<D>(), resolution)
    }

    fn build(
        &self,
        token: &Token,
        constructor: &Constructor,
        resolution: &mut Resolution,
    ) -> ContainerResult<ServiceArc> {
        if resolution.contains(token) {
            return Err(resolution.cycle(token));
        }

        trace!(token = %token, implementation = constructor.type_name(), "Constructing service");
        resolution.chain.push(token.clone());
        let result = self
            .collect(constructor, resolution)
            .and_then(|args| constructor.build(args));
        resolution.chain.pop();
        result
    }

    fn collect(
        &self,
        constructor: &Constructor,
        resolution: &mut Resolution,
    ) -> ContainerResult<Arguments> {
        let owner = constructor.type_name();
        let values = constructor
            .dependencies()
            .iter()
            .enumerate()
            .map(|(position, dependency)| dependency.resolve(self, owner, position, resolution))
            .collect::<ContainerResult<Vec<_>>>()?;
        Ok(Arguments::new(owner, values))
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.read().len())
            .field("instances", &self.instances.read().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::container::Dependency;

    static COUNTER_BUILDS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Counter {
        serial: usize,
    }

    impl Injectable for Counter {
        fn construct(_: Arguments) -> ContainerResult<Self> {
            Ok(Self {
                serial: COUNTER_BUILDS.fetch_add(1, Ordering::SeqCst),
            })
        }
    }

    #[derive(Debug)]
    struct Database {
        url: String,
    }

    #[derive(Debug)]
    struct Repository {
        db: Arc<Database>,
    }

    impl Injectable for Repository {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::token("db")]
        }

        fn construct(mut args: Arguments) -> ContainerResult<Self> {
            Ok(Self { db: args.take()? })
        }
    }

    #[derive(Default)]
    struct Clock;

    impl Injectable for Clock {
        fn construct(_: Arguments) -> ContainerResult<Self> {
            Ok(Self)
        }
    }

    struct Scheduler {
        _clock: Arc<Clock>,
        repository: Arc<Repository>,
    }

    impl Injectable for Scheduler {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::of::<Clock>(), Dependency::of::<Repository>()]
        }

        fn construct(mut args: Arguments) -> ContainerResult<Self> {
            Ok(Self {
                _clock: args.take()?,
                repository: args.take()?,
            })
        }
    }

    struct Loose;

    impl Injectable for Loose {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::unspecified()]
        }

        fn construct(_: Arguments) -> ContainerResult<Self> {
            Ok(Self)
        }
    }

    #[derive(Debug)]
    struct Chicken;
    struct Egg;

    impl Injectable for Chicken {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::token("egg")]
        }

        fn construct(_: Arguments) -> ContainerResult<Self> {
            Ok(Self)
        }
    }

    impl Injectable for Egg {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::token("chicken")]
        }

        fn construct(_: Arguments) -> ContainerResult<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn test_singleton_returns_same_instance() {
        let container = Container::new();
        container.singleton::<Counter>("counter");

        let a = container.resolve::<Counter>("counter").unwrap();
        let b = container.resolve::<Counter>("counter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.serial, b.serial);
    }

    #[test]
    fn test_transient_returns_fresh_instances() {
        let container = Container::new();
        container.bind::<Counter>("counter");

        let a = container.resolve::<Counter>("counter").unwrap();
        let b = container.resolve::<Counter>("counter").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.serial, b.serial);
    }

    #[test]
    fn test_missing_service() {
        let container = Container::new();
        let err = container.resolve::<Counter>("nope").unwrap_err();
        assert!(matches!(err, ContainerError::ServiceNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_explicit_token_injection() {
        let container = Container::new();
        container.instance(
            "db",
            Database {
                url: "sqlite::memory:".into(),
            },
        );
        container.bind::<Repository>("repo");

        let repo = container.resolve::<Repository>("repo").unwrap();
        assert_eq!(repo.db.url, "sqlite::memory:");
    }

    #[test]
    fn test_unbound_token_is_unresolvable() {
        let container = Container::new();
        container.bind::<Repository>("repo");

        let err = container.resolve::<Repository>("repo").unwrap_err();
        assert!(matches!(
            err,
            ContainerError::UnresolvableDependency { position: 0, .. }
        ));
    }

    #[test]
    fn test_unspecified_dependency_is_unresolvable() {
        let container = Container::new();
        assert!(matches!(
            container.make::<Loose>(),
            Err(ContainerError::UnresolvableDependency { .. })
        ));
    }

    #[test]
    fn test_make_builds_concrete_dependencies() {
        let container = Container::new();
        container.instance(
            "db",
            Database {
                url: "postgres://localhost".into(),
            },
        );

        let scheduler = container.make::<Scheduler>().unwrap();
        assert_eq!(scheduler.repository.db.url, "postgres://localhost");
    }

    #[test]
    fn test_typed_dependency_prefers_binding() {
        let container = Container::new();
        container.instance("db", Database { url: "a".into() });
        let shared = Arc::new(Repository {
            db: Arc::new(Database { url: "bound".into() }),
        });
        container.instance_arc(Token::of::<Repository>(), Arc::clone(&shared));

        let scheduler = container.make::<Scheduler>().unwrap();
        assert!(Arc::ptr_eq(&scheduler.repository, &shared));
    }

    #[test]
    fn test_circular_dependency_is_reported() {
        let container = Container::new();
        container.singleton::<Chicken>("chicken");
        container.singleton::<Egg>("egg");

        let err = container.resolve::<Chicken>("chicken").unwrap_err();
        assert!(matches!(err, ContainerError::CircularDependency(chain) if chain.contains("egg")));
    }

    #[test]
    fn test_type_mismatch() {
        let container = Container::new();
        container.instance("db", Database { url: "x".into() });
        assert!(matches!(
            container.resolve::<Clock>("db"),
            Err(ContainerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_has_and_forget() {
        let container = Container::new();
        assert!(!container.has("clock"));

        container.bind::<Clock>("clock");
        assert!(container.has("clock"));

        container.forget("clock");
        assert!(!container.has("clock"));

        container.instance("clock", Clock);
        assert!(container.has("clock"));
    }

    #[test]
    fn test_rebind_replaces_cached_instance() {
        let container = Container::new();
        container.instance("db", Database { url: "old".into() });
        container.bind_with(
            "db",
            Constructor::factory(vec![], |_| Ok(Database { url: "new".into() })),
            Lifetime::Singleton,
        );

        assert_eq!(container.resolve::<Database>("db").unwrap().url, "new");
    }

    #[test]
    fn test_factory_constructor() {
        let container = Container::new();
        container.instance("prefix", String::from("pg"));
        container.bind_with(
            "db",
            Constructor::factory(vec![Dependency::token("prefix")], |mut args| {
                let prefix = args.take::<String>()?;
                Ok(Database {
                    url: format!("{prefix}://db"),
                })
            }),
            Lifetime::Transient,
        );

        assert_eq!(container.resolve::<Database>("db").unwrap().url, "pg://db");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_singleton_constructed_once() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        struct Slow;

        impl Injectable for Slow {
            fn construct(_: Arguments) -> ContainerResult<Self> {
                BUILDS.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(Self)
            }
        }

        let container = Arc::new(Container::new());
        container.singleton::<Slow>("slow");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let container = Arc::clone(&container);
                tokio::task::spawn_blocking(move || container.resolve::<Slow>("slow").unwrap())
            })
            .collect();

        let mut instances = Vec::new();
        for task in tasks {
            instances.push(task.await.unwrap());
        }

        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
