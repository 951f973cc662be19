use std::{
    any::{TypeId, type_name},
    collections::{BTreeMap, btree_map},
};

use basin_core::model::{Model, VarId};
use tracing::{debug, info};

use super::{CostingError, CostingPackage};

/// Identity of the builder that constructed a parameter block.
///
/// Two registrations refer to the same builder exactly when their metadata
/// match. Builders are identified by their Rust type unless they carry an
/// explicit key from [`BuilderMeta::named`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderMeta {
    name: &'static str,
    module: &'static str,
    token: Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Type(TypeId),
    Named,
    /// A type shared by many builders, such as a function pointer or a boxed
    /// closure. Never a valid identity.
    Erased,
}

impl BuilderMeta {
    /// Metadata for the builder type `B`.
    ///
    /// Function pointers and trait objects erase the builder behind them, so
    /// their metadata is marked as erased and rejected on registration.
    #[must_use]
    pub fn of<B: ?Sized + 'static>() -> Self {
        let full = type_name::<B>();
        let path = full.split('<').next().unwrap_or(full);
        let (module, name) = match path.rfind("::") {
            Some(at) => (&full[..at], &full[at + 2..]),
            None => ("", full),
        };
        let token = if erases_builder(full) {
            Token::Erased
        } else {
            Token::Type(TypeId::of::<B>())
        };
        Self {
            name,
            module,
            token,
        }
    }

    /// Metadata for the type of `builder`, for builders whose type cannot be
    /// named, such as functions and closures.
    #[must_use]
    pub fn of_val<B: ?Sized + 'static>(_builder: &B) -> Self {
        Self::of::<B>()
    }

    /// Metadata identified by `name` within `module` rather than by type.
    ///
    /// Builders that share a type but build different blocks, such as
    /// function pointers or configured structs, use this to stay distinct.
    #[must_use]
    pub const fn named(name: &'static str, module: &'static str) -> Self {
        Self {
            name,
            module,
            token: Token::Named,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Whether this metadata cannot tell distinct builders apart.
    #[must_use]
    pub fn is_erased(&self) -> bool {
        self.token == Token::Erased
    }
}

fn erases_builder(full: &str) -> bool {
    let name = full.trim_start_matches('&').trim_start_matches("mut ");
    ["fn(", "for<", "unsafe ", "extern ", "dyn "]
        .iter()
        .any(|prefix| name.starts_with(prefix))
        || name.contains("<dyn ")
}

/// Builds the variables of a costing-package-level parameter block.
///
/// Function items and closures are builders; each is its own builder
/// identity. Function pointers are not, since every pointer of a signature
/// shares one type; wrap them in [`NamedBuilder`] instead.
pub trait ParameterBlockBuilder: 'static {
    /// Adds the block's variables to `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be declared.
    fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError>;

    /// Identity compared across registrations of the same block.
    ///
    /// Builders whose instances build different blocks override this with
    /// [`BuilderMeta::named`].
    fn meta(&self) -> BuilderMeta {
        BuilderMeta::of::<Self>()
    }
}

impl<F> ParameterBlockBuilder for F
where
    F: Fn(&mut Model, &mut ParameterBlock) -> Result<(), CostingError> + 'static,
{
    fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError> {
        self(model, block)
    }
}

/// Signature of a parameter block builder function.
pub type BuildFn = fn(&mut Model, &mut ParameterBlock) -> Result<(), CostingError>;

/// A builder function with an explicit identity.
#[derive(Debug, Clone, Copy)]
pub struct NamedBuilder {
    meta: BuilderMeta,
    build: BuildFn,
}

impl NamedBuilder {
    #[must_use]
    pub const fn new(name: &'static str, module: &'static str, build: BuildFn) -> Self {
        Self {
            meta: BuilderMeta::named(name, module),
            build,
        }
    }
}

impl ParameterBlockBuilder for NamedBuilder {
    fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError> {
        (self.build)(model, block)
    }

    fn meta(&self) -> BuilderMeta {
        self.meta
    }
}

/// Named variables shared by every cost block of a costing package.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBlock {
    name: String,
    vars: BTreeMap<String, VarId>,
}

impl ParameterBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records `var` under `name`, replacing any earlier entry.
    pub fn insert(&mut self, name: impl Into<String>, var: VarId) {
        self.vars.insert(name.into(), var);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.vars.get(name).copied()
    }

    /// Returns the variable named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CostingError::UnknownParameter`] if the block has no such
    /// variable.
    pub fn var(&self, name: &str) -> Result<VarId, CostingError> {
        self.get(name).ok_or_else(|| CostingError::UnknownParameter {
            block: self.name.clone(),
            var: name.to_owned(),
        })
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.vars.iter().map(|(name, &var)| (name.as_str(), var))
    }
}

#[derive(Debug, Clone)]
pub(super) struct Registered {
    pub(super) origin: Option<BuilderMeta>,
    pub(super) block: ParameterBlock,
}

impl CostingPackage {
    /// Returns the parameter block `name`, building it with `builder` on
    /// first use.
    ///
    /// The first registration builds the block and fixes every variable it
    /// declares. Later registrations by the same builder return the existing
    /// block untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CostingError::Conflict`] if the block was built by a
    /// different builder, [`CostingError::Unregistered`] if it was added
    /// without a builder, [`CostingError::AnonymousBuilder`] if the builder
    /// has no identity of its own, or the builder's own error.
    pub fn register<B: ParameterBlockBuilder>(
        &mut self,
        model: &mut Model,
        name: &str,
        builder: &B,
    ) -> Result<&ParameterBlock, CostingError> {
        let meta = builder.meta();
        if meta.is_erased() {
            return Err(CostingError::AnonymousBuilder {
                package: self.name.clone(),
                block: name.to_owned(),
                builder: type_name::<B>().to_owned(),
            });
        }

        match self.blocks.entry(name.to_owned()) {
            btree_map::Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                match entry.origin {
                    Some(origin) if origin == meta => {
                        debug!(
                            package = %self.name,
                            block = name,
                            "reusing costing parameter block"
                        );
                        Ok(&entry.block)
                    }
                    Some(origin) => Err(CostingError::Conflict {
                        package: self.name.clone(),
                        block: name.to_owned(),
                        builder: origin.name.to_owned(),
                        module: origin.module.to_owned(),
                    }),
                    None => Err(CostingError::Unregistered {
                        package: self.name.clone(),
                        block: name.to_owned(),
                    }),
                }
            }
            btree_map::Entry::Vacant(vacant) => {
                let mut block = ParameterBlock::new(format!("{}.{name}", self.name));
                builder.build(model, &mut block)?;
                for (_, var) in block.vars() {
                    model.fix(var);
                }
                info!(
                    package = %self.name,
                    block = name,
                    builder = meta.name,
                    vars = block.vars.len(),
                    "built costing parameter block"
                );
                let entry = vacant.insert(Registered {
                    origin: Some(meta),
                    block,
                });
                Ok(&entry.block)
            }
        }
    }

    /// Attaches a parameter block that no builder owns.
    ///
    /// A later [`Self::register`] under the same name fails with
    /// [`CostingError::Unregistered`].
    ///
    /// # Errors
    ///
    /// Returns [`CostingError::Duplicate`] if the name is taken.
    pub fn add_block(&mut self, block: ParameterBlock) -> Result<(), CostingError> {
        let name = block
            .name
            .strip_prefix(&format!("{}.", self.name))
            .unwrap_or(&block.name)
            .to_owned();
        if self.blocks.contains_key(&name) {
            return Err(CostingError::Duplicate {
                package: self.name.clone(),
                block: name,
            });
        }
        self.blocks.insert(name, Registered { origin: None, block });
        Ok(())
    }

    /// Returns the parameter block registered as `name`.
    #[must_use]
    pub fn parameter_block(&self, name: &str) -> Option<&ParameterBlock> {
        self.blocks.get(name).map(|entry| &entry.block)
    }

    /// Returns the builder that constructed the block `name`, if any.
    #[must_use]
    pub fn builder_of(&self, name: &str) -> Option<BuilderMeta> {
        self.blocks.get(name).and_then(|entry| entry.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use basin_core::{model::Variable, units::Units};

    struct Rates;

    impl ParameterBlockBuilder for Rates {
        fn build(&self, model: &mut Model, block: &mut ParameterBlock) -> Result<(), CostingError> {
            let rate = model.add_var(
                Variable::new(format!("{}.discount_rate", block.name()), Units::dimensionless())
                    .with_value(0.08),
            );
            block.insert("discount_rate", rate);
            Ok(())
        }
    }

    #[test]
    fn builder_meta_splits_the_type_path() {
        let meta = BuilderMeta::of::<Rates>();
        assert_eq!(meta.name(), "Rates");
        assert!(meta.module().ends_with("registry::tests"));
        assert_ne!(meta, BuilderMeta::of::<ParameterBlock>());
    }

    #[test]
    fn function_pointers_are_erased() {
        assert!(BuilderMeta::of::<BuildFn>().is_erased());
        assert!(BuilderMeta::of::<Box<dyn ParameterBlockBuilder>>().is_erased());
        assert!(!BuilderMeta::of::<Rates>().is_erased());
        assert!(!BuilderMeta::named("rates", "finance").is_erased());
        assert_ne!(
            BuilderMeta::named("rates", "finance"),
            BuilderMeta::named("taxes", "finance")
        );
    }

    #[test]
    fn registration_fixes_declared_variables() {
        let mut model = Model::steady_state("fs");
        let mut package = CostingPackage::new(&mut model, "costing").unwrap();

        let block = package.register(&mut model, "finance", &Rates).unwrap();
        let rate = block.var("discount_rate").unwrap();
        assert!(model.is_fixed(rate));
        assert_eq!(package.builder_of("finance"), Some(BuilderMeta::of::<Rates>()));
    }

    #[test]
    fn missing_parameter_names_the_block() {
        let block = ParameterBlock::new("costing.finance");
        let err = block.var("tax_rate").unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter block costing.finance has no variable named `tax_rate`"
        );
    }
}
