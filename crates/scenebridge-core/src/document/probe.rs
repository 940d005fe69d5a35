//! Member resolution for document attributes
//!
//! A plain member name is tried as an instance property, then an event, then
//! an attached accessor declared by the target's own type. Every kind that
//! exists is a candidate; candidates are tried in that order and the first
//! successful assignment wins. Results are cached per (type, member name).

use crate::types::{Converter, TypeRef, TypeRefExt};
use rustc_hash::FxHashMap;

/// What a member name resolved to
#[derive(Clone)]
pub enum Member {
    /// Instance property
    Property {
        /// Type declaring the property
        declaring: TypeRef,
        /// Property type
        ty: TypeRef,
        /// Property-level text converter
        converter: Option<Converter>,
    },
    /// Event
    Event {
        /// Type declaring the event
        declaring: TypeRef,
    },
    /// Attached accessor
    Attached {
        /// Type declaring the accessor
        owner: TypeRef,
        /// Value type
        ty: TypeRef,
        /// Accessor-level text converter
        converter: Option<Converter>,
    },
}

impl Member {
    /// Value type, for properties and attached accessors
    pub fn value_type(&self) -> Option<&TypeRef> {
        match self {
            Member::Property { ty, .. } | Member::Attached { ty, .. } => Some(ty),
            Member::Event { .. } => None,
        }
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Member::Property { declaring, ty, .. } => f
                .debug_struct("Property")
                .field("declaring", &declaring.full_name())
                .field("ty", &ty.full_name())
                .finish(),
            Member::Event { declaring } => f.debug_struct("Event").field("declaring", &declaring.full_name()).finish(),
            Member::Attached { owner, ty, .. } => f
                .debug_struct("Attached")
                .field("owner", &owner.full_name())
                .field("ty", &ty.full_name())
                .finish(),
        }
    }
}

/// The ordered probe steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStep {
    /// Instance property on the type or a base
    Property,
    /// Event on the type or a base
    Event,
    /// Attached accessor declared by the type or a base
    Attached,
}

/// Ordered member probe with a per-(type, name) cache
pub struct MemberProbe {
    order: [ProbeStep; 3],
    cache: FxHashMap<(String, String, String), Vec<Member>>,
}

impl MemberProbe {
    /// Probe in the standard order
    pub fn new() -> Self {
        Self {
            order: [ProbeStep::Property, ProbeStep::Event, ProbeStep::Attached],
            cache: FxHashMap::default(),
        }
    }

    /// Probe order
    pub fn order(&self) -> &[ProbeStep] {
        &self.order
    }

    /// Every member kind `name` resolves to on `ty`, in probe order
    pub fn candidates(&mut self, ty: &TypeRef, name: &str) -> &[Member] {
        let key = (ty.module().to_string(), ty.full_name().to_string(), name.to_string());
        let order = self.order;
        self.cache
            .entry(key)
            .or_insert_with(|| order.iter().filter_map(|step| probe(ty, name, *step)).collect())
    }

    /// Number of cached (type, name) pairs
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for MemberProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn probe(ty: &TypeRef, name: &str, step: ProbeStep) -> Option<Member> {
    match step {
        ProbeStep::Property => ty.find_property(name).map(|(declaring, p)| Member::Property {
            declaring: declaring.clone(),
            ty: p.ty.clone(),
            converter: p.converter.clone(),
        }),
        ProbeStep::Event => ty.find_event(name).map(|(declaring, _)| Member::Event {
            declaring: declaring.clone(),
        }),
        ProbeStep::Attached => ty.find_attached(name).map(|(owner, a)| Member::Attached {
            owner: owner.clone(),
            ty: a.ty.clone(),
            converter: a.converter.clone(),
        }),
    }
}
