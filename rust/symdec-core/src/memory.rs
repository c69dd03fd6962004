//! In-memory collaborators: a class table, a heap-backed symbolic state and
//! a method runner that evaluates declarative invariant rules.
//!
//! These stand in for the interpreter when the decision layer runs on its
//! own (tests, the `symdec` CLI). Allocation is deterministic: replaying the
//! same facts on the same initial heap yields the same heap positions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

use crate::clause::Clause;
use crate::expr::Expr;
use crate::state::{
    ClassHierarchy, MethodRef, MethodRunner, Resolution, RunError, RunOutcome, State, StateError,
};
use crate::values::{HeapObject, HeapPos, ReferenceSymbolic, Value};

/// Root of every class hierarchy.
pub const OBJECT_CLASS: &str = "java/lang/Object";

// ── Class table ─────────────────────────────────────────────────────

/// Declared type of an object field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Bool,
    Reference(String),
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldType>,
    #[serde(default)]
    pub methods: BTreeSet<String>,
    /// Marker name to the method carrying it.
    #[serde(default)]
    pub markers: BTreeMap<String, String>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            fields: BTreeMap::new(),
            methods: BTreeSet::new(),
            markers: BTreeMap::new(),
        }
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.methods.insert(name.into());
        self
    }

    /// Declare `method` and tag it with `marker`.
    pub fn marked(mut self, marker: impl Into<String>, method: impl Into<String>) -> Self {
        let method = method.into();
        self.methods.insert(method.clone());
        self.markers.insert(marker.into(), method);
        self
    }
}

/// The set of loaded classes, rooted at [`OBJECT_CLASS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    classes: BTreeMap<String, ClassDecl>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTable {
    pub fn new() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert(OBJECT_CLASS.to_string(), ClassDecl::new(OBJECT_CLASS));
        Self { classes }
    }

    /// Add or replace a class. A class without a superclass extends the root.
    pub fn insert(&mut self, mut decl: ClassDecl) {
        if decl.superclass.is_none() && decl.name != OBJECT_CLASS {
            decl.superclass = Some(OBJECT_CLASS.to_string());
        }
        self.classes.insert(decl.name.clone(), decl);
    }

    pub fn with(mut self, decl: ClassDecl) -> Self {
        self.insert(decl);
        self
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassDecl> {
        self.classes.get(class_name)
    }

    /// Fields of `class_name` including inherited ones.
    pub fn fields_of(&self, class_name: &str) -> Vec<(String, FieldType)> {
        let mut fields = BTreeMap::new();
        for class in self.supertypes(class_name).iter().rev() {
            if let Some(decl) = self.classes.get(class) {
                for (name, ty) in &decl.fields {
                    fields.insert(name.clone(), ty.clone());
                }
            }
        }
        fields.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassHierarchy for ClassTable {
    fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    fn superclass(&self, class_name: &str) -> Option<&str> {
        self.classes
            .get(class_name)
            .and_then(|decl| decl.superclass.as_deref())
    }

    fn declares_method(&self, class_name: &str, method_name: &str) -> bool {
        self.classes
            .get(class_name)
            .is_some_and(|decl| decl.methods.contains(method_name))
    }

    fn marked_method(&self, class_name: &str, marker: &str) -> Option<&str> {
        self.classes
            .get(class_name)
            .and_then(|decl| decl.markers.get(marker))
            .map(String::as_str)
    }
}

// ── Symbolic state ──────────────────────────────────────────────────

/// A symbolic state over an explicit heap.
#[derive(Debug, Clone)]
pub struct MemoryState {
    classes: Arc<ClassTable>,
    objects: BTreeMap<HeapPos, HeapObject>,
    next_pos: HeapPos,
    /// Resolved references, keyed by origin.
    resolutions: BTreeMap<String, Resolution>,
    initialized: BTreeMap<String, bool>,
    path: Vec<Clause>,
}

impl MemoryState {
    pub fn new(classes: Arc<ClassTable>) -> Self {
        Self {
            classes,
            objects: BTreeMap::new(),
            next_pos: 0,
            resolutions: BTreeMap::new(),
            initialized: BTreeMap::new(),
            path: Vec::new(),
        }
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// Place a concrete object in the heap.
    pub fn allocate(&mut self, object: HeapObject) -> HeapPos {
        let pos = self.next_pos;
        self.next_pos += 1;
        self.objects.insert(pos, object);
        pos
    }

    pub fn object_mut(&mut self, pos: HeapPos) -> Option<&mut HeapObject> {
        self.objects.get_mut(&pos)
    }

    pub fn is_class_initialized(&self, class_name: &str) -> Option<bool> {
        self.initialized.get(class_name).copied()
    }

    /// `Ok(true)` if `reference` already resolves to `wanted`, `Ok(false)`
    /// if it is unresolved.
    fn check_resolution(
        &self,
        reference: &ReferenceSymbolic,
        wanted: impl Fn(&Resolution) -> bool,
        fact: &str,
    ) -> Result<bool, StateError> {
        match self.resolutions.get(reference.origin()) {
            None => Ok(false),
            Some(existing) if wanted(existing) => Ok(true),
            Some(existing) => Err(StateError::Contradiction(format!(
                "{} already resolves to {}, cannot assume {}",
                reference,
                describe(existing),
                fact
            ))),
        }
    }

    fn check_type(&self, reference: &ReferenceSymbolic, class_name: &str) -> Result<(), StateError> {
        if !self.classes.contains(class_name) {
            return Err(StateError::UnknownClass(class_name.to_string()));
        }
        if !self.classes.contains(reference.static_type()) {
            return Err(StateError::UnknownClass(reference.static_type().to_string()));
        }
        if !self.classes.is_subclass(class_name, reference.static_type()) {
            return Err(StateError::InvalidType {
                reference: reference.origin().to_string(),
                class_name: class_name.to_string(),
                static_type: reference.static_type().to_string(),
            });
        }
        Ok(())
    }

    fn fresh_object(&self, reference: &ReferenceSymbolic, class_name: &str) -> HeapObject {
        let mut object = HeapObject::new(class_name).with_origin(reference.clone());
        for (name, ty) in self.classes.fields_of(class_name) {
            let value = match ty {
                FieldType::Int | FieldType::Bool => {
                    Value::Term(format!("{}.{}", reference.origin(), name))
                }
                FieldType::Reference(static_type) => {
                    Value::Symbolic(reference.field(&name, static_type))
                }
            };
            object.set_field(name, value);
        }
        object
    }
}

fn describe(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Null => "null".to_string(),
        Resolution::Object(pos) => format!("Object[{}]", pos),
    }
}

impl State for MemoryState {
    fn assume_numeric(&mut self, predicate: &Expr) -> Result<(), StateError> {
        self.path.push(Clause::numeric(predicate.clone()));
        Ok(())
    }

    fn assume_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<(), StateError> {
        self.check_type(reference, class_name)?;
        let objects = &self.objects;
        let same = |r: &Resolution| match r {
            Resolution::Object(pos) => objects.get(pos).is_some_and(|o| {
                o.class_name() == class_name && o.origin() == Some(reference)
            }),
            Resolution::Null => false,
        };
        if self.check_resolution(reference, same, &format!("fresh {}", class_name))? {
            return Ok(());
        }
        let object = self.fresh_object(reference, class_name);
        let pos = self.allocate(object);
        trace!(reference = %reference, class_name, pos, "expanded");
        self.resolutions
            .insert(reference.origin().to_string(), Resolution::Object(pos));
        self.path.push(Clause::expands(reference.clone(), class_name));
        Ok(())
    }

    fn assume_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<(), StateError> {
        let target = self.objects.get(&heap_pos).ok_or_else(|| {
            StateError::Contradiction(format!("no object at Object[{}]", heap_pos))
        })?;
        if target.class_name() != object.class_name() {
            return Err(StateError::Contradiction(format!(
                "Object[{}] is a {}, not a {}",
                heap_pos,
                target.class_name(),
                object.class_name()
            )));
        }
        let class_name = target.class_name().to_string();
        self.check_type(reference, &class_name)?;
        let wanted = Resolution::Object(heap_pos);
        if self.check_resolution(reference, |r| *r == wanted, &describe(&wanted))? {
            return Ok(());
        }
        self.resolutions.insert(reference.origin().to_string(), wanted);
        self.path
            .push(Clause::aliases(reference.clone(), heap_pos, object.clone()));
        Ok(())
    }

    fn assume_null(&mut self, reference: &ReferenceSymbolic) -> Result<(), StateError> {
        if self.check_resolution(reference, |r| *r == Resolution::Null, "null")? {
            return Ok(());
        }
        self.resolutions
            .insert(reference.origin().to_string(), Resolution::Null);
        self.path.push(Clause::null(reference.clone()));
        Ok(())
    }

    fn assume_class_initialized(
        &mut self,
        class_name: &str,
        initialized: bool,
    ) -> Result<(), StateError> {
        match self.initialized.get(class_name) {
            Some(&prior) if prior == initialized => return Ok(()),
            Some(_) => {
                return Err(StateError::Contradiction(format!(
                    "class {} initialization already assumed {}",
                    class_name, !initialized
                )))
            }
            None => {}
        }
        self.initialized.insert(class_name.to_string(), initialized);
        self.path.push(if initialized {
            Clause::initialized(class_name)
        } else {
            Clause::not_initialized(class_name)
        });
        Ok(())
    }

    fn path_condition(&self) -> Vec<Clause> {
        self.path.clone()
    }

    fn resolution(&self, reference: &ReferenceSymbolic) -> Option<Resolution> {
        self.resolutions.get(reference.origin()).copied()
    }

    fn object(&self, pos: HeapPos) -> Option<&HeapObject> {
        self.objects.get(&pos)
    }

    fn heap_positions(&self) -> Vec<HeapPos> {
        self.objects.keys().copied().collect()
    }

    fn boxed_clone(&self) -> Box<dyn State> {
        Box::new(self.clone())
    }
}

// ── Rule runner ─────────────────────────────────────────────────────

fn default_max_steps() -> usize {
    64
}

/// One declarative invariant over the receiver object.
///
/// A rule over a value the state does not determine yet (a symbolic
/// primitive, an unresolved reference) holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantRule {
    IntAtLeast {
        field: String,
        min: i64,
    },
    IntAtMost {
        field: String,
        max: i64,
    },
    NotNull {
        field: String,
    },
    NoSelfLoop {
        field: String,
    },
    /// Following `field` from the receiver never revisits an object.
    /// Walks longer than `max_steps` exhaust the scope.
    Acyclic {
        field: String,
        #[serde(default = "default_max_steps")]
        max_steps: usize,
    },
}

enum Target {
    Null,
    Object(HeapPos),
    Unknown,
}

fn follow(state: &dyn State, value: &Value) -> Result<Target, String> {
    match value {
        Value::Null => Ok(Target::Null),
        Value::Ref(pos) => Ok(Target::Object(*pos)),
        Value::Symbolic(reference) => Ok(match state.resolution(reference) {
            Some(Resolution::Null) => Target::Null,
            Some(Resolution::Object(pos)) => Target::Object(pos),
            None => Target::Unknown,
        }),
        other => Err(format!("'{}' is not a reference", other)),
    }
}

fn field_of<'a>(object: &'a HeapObject, field: &str) -> Result<&'a Value, String> {
    object
        .field(field)
        .ok_or_else(|| format!("{} has no field '{}'", object.class_name(), field))
}

impl InvariantRule {
    fn evaluate(
        &self,
        state: &dyn State,
        receiver: HeapPos,
        object: &HeapObject,
    ) -> Result<RunOutcome, String> {
        let holds = match self {
            InvariantRule::IntAtLeast { field, min } => match field_of(object, field)? {
                Value::Int(v) => v >= min,
                Value::Term(_) => true,
                other => return Err(format!("'{}' is not an int", other)),
            },
            InvariantRule::IntAtMost { field, max } => match field_of(object, field)? {
                Value::Int(v) => v <= max,
                Value::Term(_) => true,
                other => return Err(format!("'{}' is not an int", other)),
            },
            InvariantRule::NotNull { field } => {
                !matches!(follow(state, field_of(object, field)?)?, Target::Null)
            }
            InvariantRule::NoSelfLoop { field } => match follow(state, field_of(object, field)?)? {
                Target::Object(pos) => pos != receiver,
                Target::Null | Target::Unknown => true,
            },
            InvariantRule::Acyclic { field, max_steps } => {
                return acyclic(state, receiver, object, field, *max_steps)
            }
        };
        Ok(RunOutcome::Returned(holds))
    }
}

fn acyclic(
    state: &dyn State,
    receiver: HeapPos,
    object: &HeapObject,
    field: &str,
    max_steps: usize,
) -> Result<RunOutcome, String> {
    let mut seen = BTreeSet::from([receiver]);
    let mut value = field_of(object, field)?;
    for _ in 0..max_steps {
        let next = match follow(state, value)? {
            Target::Null | Target::Unknown => return Ok(RunOutcome::Returned(true)),
            Target::Object(pos) => pos,
        };
        if !seen.insert(next) {
            return Ok(RunOutcome::Returned(false));
        }
        let current = state
            .object(next)
            .ok_or_else(|| format!("dangling reference to Object[{}]", next))?;
        value = match current.field(field) {
            Some(v) => v,
            None => return Ok(RunOutcome::Returned(true)),
        };
    }
    Ok(RunOutcome::ScopeExhausted)
}

/// A [`MethodRunner`] whose methods are conjunctions of [`InvariantRule`]s.
#[derive(Debug, Clone, Default)]
pub struct RuleRunner {
    rules: BTreeMap<MethodRef, Vec<InvariantRule>>,
    runs: usize,
}

impl RuleRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: MethodRef, rules: Vec<InvariantRule>) {
        self.rules.insert(method, rules);
    }

    pub fn with_rules(mut self, method: MethodRef, rules: Vec<InvariantRule>) -> Self {
        self.insert(method, rules);
        self
    }

    /// Number of method runs so far.
    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl MethodRunner for RuleRunner {
    fn run(
        &mut self,
        state: &dyn State,
        method: &MethodRef,
        receiver: HeapPos,
    ) -> Result<RunOutcome, RunError> {
        self.runs += 1;
        let fault = |message: String| RunError::Fault {
            method: method.clone(),
            message,
        };
        let rules = self
            .rules
            .get(method)
            .ok_or_else(|| RunError::MethodNotFound(method.clone()))?;
        let object = state
            .object(receiver)
            .ok_or_else(|| fault(format!("no receiver at Object[{}]", receiver)))?;

        let mut exhausted = false;
        for rule in rules {
            match rule.evaluate(state, receiver, object).map_err(fault)? {
                RunOutcome::Returned(false) => {
                    trace!(%method, receiver, ?rule, "invariant violated");
                    return Ok(RunOutcome::Returned(false));
                }
                RunOutcome::ScopeExhausted => exhausted = true,
                RunOutcome::Returned(true) => {}
            }
        }
        Ok(if exhausted {
            RunOutcome::ScopeExhausted
        } else {
            RunOutcome::Returned(true)
        })
    }
}
