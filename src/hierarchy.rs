use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::debug;

use crate::descriptor::{ErasedSignature, erased_signature};
use crate::ir::{LambdaId, LambdaSite, Method, MethodId, Model, TypeDecl, TypeId, Visibility};

/// Node of the override graph: a declared method or a lambda bound to one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum MethodLike {
    Method(MethodId),
    Lambda(LambdaId),
}

static EMPTY: BTreeSet<MethodLike> = BTreeSet::new();

/// Direct override relation over every method-like node of one model.
#[derive(Clone, Debug, Default)]
pub(crate) struct MethodHierarchy {
    supertypes: BTreeMap<TypeId, Vec<TypeId>>,
    super_methods: BTreeMap<MethodLike, BTreeSet<MethodLike>>,
    overriding_methods: BTreeMap<MethodLike, BTreeSet<MethodLike>>,
}

/// Timing breakdown for hierarchy construction.
pub(crate) struct HierarchyTimings {
    pub(crate) types_duration_ms: u128,
    pub(crate) methods_duration_ms: u128,
    pub(crate) lambdas_duration_ms: u128,
}

#[cfg(test)]
pub(crate) fn build_method_hierarchy(model: &Model) -> MethodHierarchy {
    build_method_hierarchy_with_timings(model).0
}

pub(crate) fn build_method_hierarchy_with_timings(
    model: &Model,
) -> (MethodHierarchy, HierarchyTimings) {
    let types_started_at = Instant::now();
    let supertypes = index_supertypes(model);
    let types_duration_ms = types_started_at.elapsed().as_millis();

    let methods_started_at = Instant::now();
    let mut resolver = DeclarerResolver::new(model, &supertypes);
    let mut edges = BTreeSet::new();
    for ty in model.type_ids() {
        for (signature, index) in resolver.signatures[ty.0].clone() {
            let overrider = MethodId { ty, index };
            for overridden in resolver.direct_super_declarers(ty, &signature) {
                edges.insert((MethodLike::Method(overrider), MethodLike::Method(overridden)));
            }
        }
    }
    let methods_duration_ms = methods_started_at.elapsed().as_millis();

    let lambdas_started_at = Instant::now();
    let mut bound_lambdas = 0;
    for site in model.lambdas() {
        match resolver.functional_method(site) {
            Some(method) => {
                bound_lambdas += 1;
                edges.insert((MethodLike::Lambda(site.id), MethodLike::Method(method)));
            }
            None => debug!(interface = %site.target, "lambda target has no single abstract method"),
        }
    }
    let lambdas_duration_ms = lambdas_started_at.elapsed().as_millis();

    let mut super_methods: BTreeMap<MethodLike, BTreeSet<MethodLike>> = BTreeMap::new();
    let mut overriding_methods: BTreeMap<MethodLike, BTreeSet<MethodLike>> = BTreeMap::new();
    for (overrider, overridden) in edges {
        super_methods.entry(overrider).or_default().insert(overridden);
        overriding_methods
            .entry(overridden)
            .or_default()
            .insert(overrider);
    }
    debug!(
        overriders = super_methods.len(),
        lambdas = bound_lambdas,
        memoized = resolver.memo.len(),
        "built method hierarchy"
    );

    let hierarchy = MethodHierarchy {
        supertypes,
        super_methods,
        overriding_methods,
    };
    let timings = HierarchyTimings {
        types_duration_ms,
        methods_duration_ms,
        lambdas_duration_ms,
    };
    (hierarchy, timings)
}

impl MethodHierarchy {
    /// Methods `method` overrides one declaring level up, every diamond branch included.
    pub(crate) fn direct_super_methods(&self, method: MethodLike) -> &BTreeSet<MethodLike> {
        self.super_methods.get(&method).unwrap_or(&EMPTY)
    }

    /// Exact inverse of [`Self::direct_super_methods`].
    pub(crate) fn direct_overriding_methods(&self, method: MethodLike) -> &BTreeSet<MethodLike> {
        self.overriding_methods.get(&method).unwrap_or(&EMPTY)
    }

    pub(crate) fn is_overriding(&self, method: MethodLike) -> bool {
        !self.direct_super_methods(method).is_empty()
    }

    #[cfg(test)]
    pub(crate) fn is_overridden(&self, method: MethodLike) -> bool {
        !self.direct_overriding_methods(method).is_empty()
    }

    /// Transitive closure of [`Self::direct_super_methods`].
    #[cfg(test)]
    pub(crate) fn all_super_methods(&self, method: MethodLike) -> BTreeSet<MethodLike> {
        closure(method, |node| self.direct_super_methods(node))
    }

    /// Transitive closure of [`Self::direct_overriding_methods`].
    #[cfg(test)]
    pub(crate) fn all_overriding_methods(&self, method: MethodLike) -> BTreeSet<MethodLike> {
        closure(method, |node| self.direct_overriding_methods(node))
    }

    /// Interface method a lambda implements, if it could be bound.
    #[cfg(test)]
    pub(crate) fn lambda_target(&self, lambda: LambdaId) -> Option<MethodId> {
        self.direct_super_methods(MethodLike::Lambda(lambda))
            .iter()
            .find_map(|node| match node {
                MethodLike::Method(id) => Some(*id),
                MethodLike::Lambda(_) => None,
            })
    }

    pub(crate) fn direct_supertypes(&self, ty: TypeId) -> &[TypeId] {
        self.supertypes.get(&ty).map_or(&[], Vec::as_slice)
    }

    #[cfg(test)]
    pub(crate) fn direct_subtypes(&self, ty: TypeId) -> Vec<TypeId> {
        self.supertypes
            .iter()
            .filter(|(_, supers)| supers.contains(&ty))
            .map(|(sub, _)| *sub)
            .collect()
    }
}

/// Method-like node for a method declared in `type_name`.
#[cfg(test)]
pub(crate) fn method_like_of(
    model: &Model,
    type_name: &str,
    name: &str,
    descriptor: &str,
) -> Option<MethodLike> {
    model
        .find_method(type_name, name, descriptor)
        .map(MethodLike::Method)
}

#[cfg(test)]
fn closure<'h>(
    start: MethodLike,
    next: impl Fn(MethodLike) -> &'h BTreeSet<MethodLike>,
) -> BTreeSet<MethodLike> {
    let mut seen = BTreeSet::new();
    let mut worklist = vec![start];
    while let Some(node) = worklist.pop() {
        for neighbor in next(node) {
            if seen.insert(*neighbor) {
                worklist.push(*neighbor);
            }
        }
    }
    seen.remove(&start);
    seen
}

/// Superclass plus interfaces, restricted to types present in the model.
fn index_supertypes(model: &Model) -> BTreeMap<TypeId, Vec<TypeId>> {
    let mut supertypes = BTreeMap::new();
    for (id, decl) in model.types() {
        let mut direct = Vec::new();
        for name in decl.superclass.iter().chain(decl.interfaces.iter()) {
            if let Some(super_id) = model.type_named(name) {
                if super_id != id && !direct.contains(&super_id) {
                    direct.push(super_id);
                }
            }
        }
        if !direct.is_empty() {
            supertypes.insert(id, direct);
        }
    }
    supertypes
}

/// Instance, non-private, source-level methods take part in overriding.
fn participates(method: &Method) -> bool {
    !method.implicit
        && !method.is_constructor()
        && !method.modifiers.is_static
        && method.modifiers.visibility != Visibility::Private
}

fn is_object_method(signature: &ErasedSignature) -> bool {
    matches!(
        (signature.name.as_str(), signature.parameters.as_str()),
        ("equals", "Ljava/lang/Object;") | ("hashCode", "") | ("toString", "")
    )
}

struct DeclarerResolver<'m> {
    model: &'m Model,
    supertypes: &'m BTreeMap<TypeId, Vec<TypeId>>,
    /// Participating methods per type, keyed by erased signature.
    signatures: Vec<BTreeMap<ErasedSignature, usize>>,
    memo: BTreeMap<(TypeId, ErasedSignature), BTreeSet<MethodId>>,
    in_progress: BTreeSet<(TypeId, ErasedSignature)>,
}

impl<'m> DeclarerResolver<'m> {
    fn new(model: &'m Model, supertypes: &'m BTreeMap<TypeId, Vec<TypeId>>) -> Self {
        let signatures = model
            .types()
            .map(|(_, decl)| {
                let mut by_signature = BTreeMap::new();
                for (index, method) in decl.methods.iter().enumerate() {
                    if !participates(method) {
                        continue;
                    }
                    match erased_signature(&method.name, &method.descriptor) {
                        Ok(signature) => {
                            by_signature.entry(signature).or_insert(index);
                        }
                        Err(error) => debug!(
                            owner = %decl.name,
                            method = %method.name,
                            "skipping method with unreadable descriptor: {error:#}"
                        ),
                    }
                }
                by_signature
            })
            .collect();
        Self {
            model,
            supertypes,
            signatures,
            memo: BTreeMap::new(),
            in_progress: BTreeSet::new(),
        }
    }

    fn direct_supertypes(&self, ty: TypeId) -> &'m [TypeId] {
        self.supertypes.get(&ty).map_or(&[], Vec::as_slice)
    }

    /// Nearest declarations of `signature` above `ty`, filtered by
    /// accessibility from `ty`.
    fn direct_super_declarers(
        &mut self,
        ty: TypeId,
        signature: &ErasedSignature,
    ) -> BTreeSet<MethodId> {
        let owner = self.model.type_decl(ty);
        let mut found = BTreeSet::new();
        for super_id in self.direct_supertypes(ty) {
            found.extend(
                self.declarers(*super_id, signature)
                    .into_iter()
                    .filter(|declarer| self.is_accessible(*declarer, owner)),
            );
        }
        found
    }

    /// Declarations of `signature` visible from `ty`: its own, or else the
    /// nearest along every supertype branch.
    fn declarers(&mut self, ty: TypeId, signature: &ErasedSignature) -> BTreeSet<MethodId> {
        if let Some(index) = self.signatures[ty.0].get(signature) {
            return BTreeSet::from([MethodId { ty, index: *index }]);
        }
        let key = (ty, signature.clone());
        if let Some(cached) = self.memo.get(&key) {
            return cached.clone();
        }
        if !self.in_progress.insert(key.clone()) {
            return BTreeSet::new();
        }
        let mut found = BTreeSet::new();
        for super_id in self.direct_supertypes(ty) {
            found.extend(self.declarers(*super_id, signature));
        }
        self.in_progress.remove(&key);
        self.memo.insert(key, found.clone());
        found
    }

    fn is_accessible(&self, declarer: MethodId, from: &TypeDecl) -> bool {
        let method = self.model.method(declarer);
        method.modifiers.visibility != Visibility::Package
            || self.model.type_decl(declarer.ty).package() == from.package()
    }

    /// Interface method a lambda is bound to: the one named by the model,
    /// or else the single abstract method of the target interface.
    fn functional_method(&mut self, site: &LambdaSite) -> Option<MethodId> {
        let target = self.model.type_named(&site.target)?;
        let signature = match &site.method {
            Some(method) => erased_signature(&method.name, &method.descriptor).ok()?,
            None => self.single_abstract_signature(target)?,
        };
        self.declarers(target, &signature).into_iter().next()
    }

    fn single_abstract_signature(&self, target: TypeId) -> Option<ErasedSignature> {
        let mut abstract_signatures = BTreeSet::new();
        let mut implemented = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut worklist = vec![target];
        while let Some(ty) = worklist.pop() {
            if !seen.insert(ty) {
                continue;
            }
            let decl = self.model.type_decl(ty);
            for (signature, index) in &self.signatures[ty.0] {
                if is_object_method(signature) {
                    continue;
                }
                if decl.methods[*index].is_abstract_in(decl) {
                    abstract_signatures.insert(signature.clone());
                } else {
                    implemented.insert(signature.clone());
                }
            }
            worklist.extend(self.direct_supertypes(ty));
        }
        let mut remaining = abstract_signatures.difference(&implemented);
        let signature = remaining.next()?.clone();
        remaining.next().is_none().then_some(signature)
    }
}
