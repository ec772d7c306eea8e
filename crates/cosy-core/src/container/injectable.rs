use std::any::type_name;
use std::sync::Arc;

use super::registry::{Container, Resolution};
use super::{ServiceArc, Token};
use crate::error::{ContainerError, ContainerResult};

/// A type the container can build.
///
/// `dependencies` is the explicit, ordered list of what `construct` will pull
/// out of its [`Arguments`]. The container resolves each entry in that order
/// and hands the results over positionally.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Dependencies required by [`construct`](Self::construct), in order.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Builds the service from its resolved dependencies.
    fn construct(args: Arguments) -> ContainerResult<Self>;
}

pub(super) type MakeFn = fn(&Container, &mut Resolution) -> ContainerResult<ServiceArc>;

#[derive(Clone)]
enum DependencyKind {
    /// Must be bound under exactly this token.
    Token(Token),
    /// Resolved through its type token when bound, built on the spot otherwise.
    Type { token: Token, make: MakeFn },
    /// A slot that names neither a token nor a type.
    Unspecified,
}

/// A single declared dependency.
#[derive(Clone)]
pub struct Dependency {
    kind: DependencyKind,
}

impl Dependency {
    /// Dependency on whatever is registered under `token`.
    ///
    /// Resolution fails with
    /// [`UnresolvableDependency`](ContainerError::UnresolvableDependency) when
    /// nothing is registered there.
    pub fn token(token: impl Into<Token>) -> Self {
        Self {
            kind: DependencyKind::Token(token.into()),
        }
    }

    /// Dependency on the concrete type `D`.
    ///
    /// Uses the binding for `Token::of::<D>()` if one exists, otherwise builds
    /// a fresh `D` through its own [`Injectable`] implementation.
    pub fn of<D: Injectable>() -> Self {
        Self {
            kind: DependencyKind::Type {
                token: Token::of::<D>(),
                make: Container::make_erased::<D>,
            },
        }
    }

    /// A placeholder slot with no way to be resolved.
    pub fn unspecified() -> Self {
        Self {
            kind: DependencyKind::Unspecified,
        }
    }

    /// Resolves this dependency as argument `position` of `owner`.
    pub(super) fn resolve(
        &self,
        container: &Container,
        owner: &'static str,
        position: usize,
        resolution: &mut Resolution,
    ) -> ContainerResult<ServiceArc> {
        match &self.kind {
            DependencyKind::Token(token) => {
                if !container.has(token) {
                    return Err(ContainerError::unresolvable(
                        owner,
                        position,
                        format!("no service registered for token '{token}'"),
                    ));
                }
                container.resolve_in(token, resolution)
            }
            DependencyKind::Type { token, make } => {
                if container.has(token) {
                    container.resolve_in(token, resolution)
                } else {
                    make(container, resolution)
                }
            }
            DependencyKind::Unspecified => Err(ContainerError::unresolvable(
                owner,
                position,
                "parameter declares neither a type nor an injection token",
            )),
        }
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DependencyKind::Token(token) => write!(f, "Dependency::token({token})"),
            DependencyKind::Type { token, .. } => write!(f, "Dependency::of({token})"),
            DependencyKind::Unspecified => f.write_str("Dependency::unspecified()"),
        }
    }
}

/// Resolved dependencies handed to a constructor, in declaration order.
pub struct Arguments {
    owner: &'static str,
    values: std::vec::IntoIter<ServiceArc>,
    position: usize,
}

impl Arguments {
    pub(super) fn new(owner: &'static str, values: Vec<ServiceArc>) -> Self {
        Self {
            owner,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next argument as an `Arc<T>`.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> ContainerResult<Arc<T>> {
        let position = self.position;
        self.position += 1;

        let value = self.values.next().ok_or_else(|| {
            ContainerError::construction(
                self.owner,
                format!("argument #{position} was not declared as a dependency"),
            )
        })?;

        value
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                token: format!("{}#{position}", self.owner),
                expected: type_name::<T>(),
            })
    }

    /// Number of arguments not yet taken.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

type BuildFn = dyn Fn(Arguments) -> ContainerResult<ServiceArc> + Send + Sync;

/// How a binding produces its service.
#[derive(Clone)]
pub struct Constructor {
    type_name: &'static str,
    dependencies: Arc<[Dependency]>,
    build: Arc<BuildFn>,
}

impl Constructor {
    /// Constructor backed by `T`'s [`Injectable`] implementation.
    pub fn of<T: Injectable>() -> Self {
        Self {
            type_name: type_name::<T>(),
            dependencies: T::dependencies().into(),
            build: Arc::new(|args| T::construct(args).map(|value| Arc::new(value) as ServiceArc)),
        }
    }

    /// Constructor backed by a closure with its own dependency list.
    pub fn factory<T, F>(dependencies: Vec<Dependency>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            dependencies: dependencies.into(),
            build: Arc::new(move |args| factory(args).map(|value| Arc::new(value) as ServiceArc)),
        }
    }

    /// Name of the type this constructor produces.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The declared dependencies.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub(super) fn build(&self, args: Arguments) -> ContainerResult<ServiceArc> {
        (self.build)(args)
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
