use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Debug, Formatter},
};
use tracing::{debug, error, info, warn};

use crate::{
    any::TypeInfo,
    config::Config,
    errors::{BuildErrorKind, ModuleErrorKind},
    injector::Injector,
    module::{Module, ModuleId, ModuleInfo, ModuleMetadata},
    registry::RegistryBuilder,
};

struct PendingModule {
    id: ModuleId,
    metadata: ModuleMetadata,
    module: Box<dyn Module>,
}

/// Composes modules into an [`Injector`].
///
/// Modules are applied after the modules they override, otherwise in the order they were added.
/// A module equal to an already added one by [`ModuleId`] is skipped.
#[derive(Default)]
pub struct InjectorBuilder {
    config: Config,
    modules: Vec<PendingModule>,
}

impl InjectorBuilder {
    #[inline]
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            modules: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn module<M: Module>(mut self, module: M) -> Self {
        self.add_module(module);
        self
    }

    pub fn add_module<M: Module>(&mut self, module: M) -> &mut Self {
        let id = ModuleId::of(&module);
        if self.modules.iter().any(|pending| pending.id == id) {
            debug!(module = %id, "Module already added, skipped");
            return self;
        }

        self.modules.push(PendingModule {
            id,
            metadata: module.metadata(),
            module: Box::new(module),
        });
        self
    }

    /// Orders, configures and finalizes the modules
    ///
    /// # Errors
    /// - [`ModuleErrorKind::Cycle`] if the override relation between the modules is cyclic
    /// - [`ModuleErrorKind::Configure`] if a module fails to register its bindings
    /// - [`BuildErrorKind::Bind`] if the registry can't be finalized
    pub fn build(self) -> Result<Injector, BuildErrorKind> {
        let Self { config, modules } = self;

        let edges = override_edges(&modules);
        let order = linearize(&modules, &edges)?;

        let mut registry = RegistryBuilder::new(config);
        for (overridden, overriding) in edges.iter().flat_map(|(overridden, overriding)| {
            overriding.iter().map(move |overriding| (*overridden, *overriding))
        }) {
            registry.declare_override(modules[overriding].id, modules[overridden].id)?;
        }

        let mut infos = Vec::with_capacity(modules.len());
        for index in order {
            let PendingModule { id, metadata, module } = &modules[index];

            debug!(module = %id, "Configuring module");
            module
                .configure(&mut registry.module_binder(*id))
                .map_err(|source| ModuleErrorKind::Configure { module: *id, source })?;

            infos.push(ModuleInfo {
                id: *id,
                name: metadata
                    .name
                    .clone()
                    .unwrap_or_else(|| Cow::Borrowed(id.type_info.short_name())),
                description: metadata.description.clone(),
                overrides: edges
                    .iter()
                    .filter(|(_, overriding)| overriding.contains(&index))
                    .map(|(overridden, _)| modules[*overridden].id)
                    .collect(),
            });
        }

        let registry = registry.finalize()?;
        info!(modules = infos.len(), bindings = registry.len(), "Injector built");

        Ok(Injector::with_modules(registry, infos))
    }
}

impl Debug for InjectorBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorBuilder")
            .field("config", &self.config)
            .field("modules", &self.modules.iter().map(|module| module.id).collect::<Vec<_>>())
            .finish()
    }
}

/// Index of an overridden module to indexes of the modules overriding it
fn override_edges(modules: &[PendingModule]) -> BTreeMap<usize, BTreeSet<usize>> {
    let mut edges: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for (overriding, module) in modules.iter().enumerate() {
        for overridden_type in &module.metadata.overrides {
            let overridden = indexes_of_type(modules, *overridden_type);
            if overridden.is_empty() {
                warn!(module = %module.id, overridden = overridden_type.short_name(), "Overridden module isn't added");
                continue;
            }
            for overridden in overridden {
                edges.entry(overridden).or_default().insert(overriding);
            }
        }
    }
    edges
}

fn indexes_of_type(modules: &[PendingModule], type_info: TypeInfo) -> Vec<usize> {
    modules
        .iter()
        .enumerate()
        .filter(|(_, module)| module.id.type_info == type_info)
        .map(|(index, _)| index)
        .collect()
}

/// Stable topological order: overridden modules go first, ties are broken by the order of addition
fn linearize(modules: &[PendingModule], edges: &BTreeMap<usize, BTreeSet<usize>>) -> Result<Vec<usize>, ModuleErrorKind> {
    let mut in_degree = vec![0_usize; modules.len()];
    for overriding in edges.values().flatten() {
        in_degree[*overriding] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..modules.len()).filter(|index| in_degree[*index] == 0).collect();
    let mut order = Vec::with_capacity(modules.len());
    while let Some(index) = ready.pop_first() {
        order.push(index);
        for overriding in edges.get(&index).into_iter().flatten() {
            in_degree[*overriding] -= 1;
            if in_degree[*overriding] == 0 {
                ready.insert(*overriding);
            }
        }
    }

    if order.len() == modules.len() {
        return Ok(order);
    }

    let remaining: BTreeSet<usize> = (0..modules.len()).filter(|index| in_degree[*index] > 0).collect();
    let path = find_cycle(edges, &remaining)
        .into_iter()
        .map(|index| modules[index].id)
        .collect();
    let err = ModuleErrorKind::Cycle { path };
    error!("{}", err);
    Err(err)
}

/// Cycle among the remaining modules, the first module is repeated at the end
fn find_cycle(edges: &BTreeMap<usize, BTreeSet<usize>>, remaining: &BTreeSet<usize>) -> Vec<usize> {
    let Some(&start) = remaining.first() else {
        return Vec::new();
    };

    // Every remaining module has a remaining predecessor, so walking them back must revisit a module
    let predecessor = |index: usize| {
        edges
            .iter()
            .find(|(overridden, overriding)| remaining.contains(overridden) && overriding.contains(&index))
            .map(|(overridden, _)| *overridden)
    };

    let mut path = vec![start];
    let mut current = start;
    while let Some(previous) = predecessor(current) {
        if let Some(position) = path.iter().position(|index| *index == previous) {
            let mut cycle: Vec<usize> = path[position..].to_vec();
            cycle.reverse();
            cycle.push(*cycle.first().unwrap_or(&previous));
            return cycle;
        }
        path.push(previous);
        current = previous;
    }
    path
}
