//! Local variable bindings of one method.
//!
//! Bindings live in an arena keyed by [`VariableId`]. Each binding belongs to a
//! slot and starts at a declaring offset. Type constraints from reads
//! (`type_on_left`) and writes (`type_on_right`) narrow the binding's type.
//! Linking two bindings (`variable_on_left` / `variable_on_right`) merges them
//! into one union-find set that shares a single constraint. Bindings declared
//! by the local variable table or the method descriptor keep their declared
//! type.

use crate::constant_info::ConstantPool;
use crate::error::Result;
use crate::method_info::Method;

use super::primitive;
use super::type_maker::TypeMaker;
use super::types::{ObjectType, PrimitiveFlags, PrimitiveType, Type, TYPE_OBJECT};

pub type VariableId = usize;

/// What a binding can hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Primitive(PrimitiveFlags),
    Object(Type),
}

impl VariableKind {
    pub fn of(ty: &Type) -> Self {
        match ty {
            Type::Primitive(p) => VariableKind::Primitive(p.flags()),
            other => VariableKind::Object(other.clone()),
        }
    }

    pub fn to_type(&self) -> Type {
        match self {
            VariableKind::Primitive(flags) => Type::Primitive(primitive::resolve_flags(*flags)),
            VariableKind::Object(ty) => ty.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariable {
    pub index: u16,
    pub from_offset: usize,
    pub to_offset: usize,
    pub name: Option<String>,
    declared: Option<VariableKind>,
    removed: bool,
}

impl LocalVariable {
    pub fn is_declared(&self) -> bool {
        self.declared.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct LocalVariables {
    variables: Vec<LocalVariable>,
    parents: Vec<VariableId>,
    constraints: Vec<VariableKind>,
}

impl LocalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `this`, the parameters and the local variable table entries of
    /// `method`.
    pub fn for_method(
        method: &Method,
        constants: &ConstantPool,
        type_maker: &dyn TypeMaker,
        class_type: &ObjectType,
    ) -> Result<Self> {
        let mut locals = LocalVariables::new();
        let end = method.code.len();

        if let Some(table) = &method.local_variable_table {
            for entry in &table.items {
                let name = constants.utf8(entry.name_index)?;
                let ty = type_maker.make_from_descriptor(constants.utf8(entry.descriptor_index)?)?;
                let from = entry.start_pc as usize;
                locals.declare(entry.index, from, from + entry.length as usize, Some(name), &ty);
            }
        }

        let mut slot = 0u16;
        if !method.is_static() {
            if locals.get(0, 0).is_none() {
                locals.declare(0, 0, end, Some("this"), &Type::Object(class_type.clone()));
            }
            slot = 1;
        }
        let types = type_maker.make_method_types(class_type, &method.name, &method.descriptor)?;
        for ty in &types.parameter_types {
            if locals.get(slot, 0).is_none() {
                locals.declare(slot, 0, end, None, ty);
            }
            slot += if ty.is_wide() { 2 } else { 1 };
        }
        log::trace!(
            "{}{}: {} local variable bindings declared",
            method.name,
            method.descriptor,
            locals.len()
        );
        Ok(locals)
    }

    fn push(&mut self, variable: LocalVariable, kind: VariableKind) -> VariableId {
        let id = self.variables.len();
        self.variables.push(variable);
        self.parents.push(id);
        self.constraints.push(kind);
        id
    }

    /// Adds a binding with a fixed type.
    pub fn declare(
        &mut self,
        index: u16,
        from_offset: usize,
        to_offset: usize,
        name: Option<&str>,
        ty: &Type,
    ) -> VariableId {
        let kind = VariableKind::of(ty);
        self.push(
            LocalVariable {
                index,
                from_offset,
                to_offset,
                name: name.map(str::to_string),
                declared: Some(kind.clone()),
                removed: false,
            },
            kind,
        )
    }

    fn create(&mut self, index: u16, offset: usize, kind: VariableKind) -> VariableId {
        log::trace!("new binding for slot {} at offset {}", index, offset);
        self.push(
            LocalVariable {
                index,
                from_offset: offset,
                to_offset: usize::MAX,
                name: None,
                declared: None,
                removed: false,
            },
            kind,
        )
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variable(&self, id: VariableId) -> &LocalVariable {
        &self.variables[id]
    }

    /// Live bindings, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &LocalVariable)> {
        self.variables.iter().enumerate().filter(|(_, v)| !v.removed)
    }

    /// The most recently started live binding of `index` covering `offset`.
    pub fn get(&self, index: u16, offset: usize) -> Option<VariableId> {
        self.iter()
            .filter(|(_, v)| v.index == index && v.from_offset <= offset && offset <= v.to_offset)
            .max_by_key(|(id, v)| (v.from_offset, *id))
            .map(|(id, _)| id)
    }

    /// Binding read at `offset`, created from `hint` when the slot has none.
    pub fn get_or_create(&mut self, index: u16, offset: usize, hint: &Type) -> VariableId {
        match self.get(index, offset) {
            Some(id) => id,
            None => self.create(index, offset, VariableKind::of(hint)),
        }
    }

    /// Binding written at `offset` by a value of type `ty`. A live binding is
    /// reused when it accepts the value; otherwise a new one starts here.
    pub fn in_assignment(&mut self, index: u16, offset: usize, ty: &Type) -> VariableId {
        if let Some(id) = self.get(index, offset) {
            if self.is_assignable_from(id, ty) {
                self.type_on_right(id, ty);
                return id;
            }
        }
        self.create(index, offset, VariableKind::of(ty))
    }

    /// Binding written at `offset` by `null`.
    pub fn in_null_assignment(&mut self, index: u16, offset: usize, ty: &Type) -> VariableId {
        if let Some(id) = self.get(index, offset) {
            if matches!(self.kind(id), VariableKind::Object(_)) {
                return id;
            }
        }
        self.create(index, offset, VariableKind::Object(ty.clone()))
    }

    /// Binding written at `offset` from another variable, linked to it.
    pub fn in_assignment_from_variable(
        &mut self,
        index: u16,
        offset: usize,
        other: VariableId,
    ) -> VariableId {
        let other_type = self.variable_type(other);
        let id = match self.get(index, offset) {
            Some(id) if id != other && self.is_assignable_from(id, &other_type) => id,
            _ => {
                let kind = self.kind(other).clone();
                self.create(index, offset, kind)
            }
        };
        self.variable_on_right(id, other);
        id
    }

    fn root(&self, mut id: VariableId) -> VariableId {
        while self.parents[id] != id {
            id = self.parents[id];
        }
        id
    }

    fn kind(&self, id: VariableId) -> &VariableKind {
        match &self.variables[id].declared {
            Some(kind) => kind,
            None => &self.constraints[self.root(id)],
        }
    }

    pub fn variable_type(&self, id: VariableId) -> Type {
        self.kind(id).to_type()
    }

    pub fn name(&self, id: VariableId) -> Option<&str> {
        self.variables[id].name.as_deref()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.iter().any(|(_, v)| v.name.as_deref() == Some(name))
    }

    /// Drops a synthetic binding.
    pub fn remove(&mut self, id: VariableId) {
        log::trace!("removing binding {} of slot {}", id, self.variables[id].index);
        self.variables[id].removed = true;
    }

    pub fn is_removed(&self, id: VariableId) -> bool {
        self.variables[id].removed
    }

    /// Are `a` and `b` in the same linked set?
    pub fn are_linked(&self, a: VariableId, b: VariableId) -> bool {
        self.root(a) == self.root(b)
    }

    pub fn is_assignable_from(&self, id: VariableId, ty: &Type) -> bool {
        match (self.kind(id), ty) {
            (VariableKind::Primitive(flags), Type::Primitive(p)) => flags.intersects(p.flags()),
            (VariableKind::Primitive(_), _) => false,
            (VariableKind::Object(_), Type::Primitive(_)) => false,
            (VariableKind::Object(current), other) => {
                current.dimension() == other.dimension() || is_plain_object(current)
            }
        }
    }

    /// The binding is read where `ty` is expected.
    pub fn type_on_left(&mut self, id: VariableId, ty: &Type) {
        self.narrow(id, ty, |p| p.left_flags());
    }

    /// The binding receives a value of type `ty`.
    pub fn type_on_right(&mut self, id: VariableId, ty: &Type) {
        self.narrow(id, ty, |p| p.right_flags());
    }

    fn narrow(&mut self, id: VariableId, ty: &Type, side: fn(&PrimitiveType) -> PrimitiveFlags) {
        if self.variables[id].declared.is_some() {
            return;
        }
        let root = self.root(id);
        let narrowed = match (&self.constraints[root], ty) {
            (VariableKind::Primitive(flags), Type::Primitive(p)) => {
                let f = side(p);
                if flags.intersects(f) {
                    Some(VariableKind::Primitive(*flags & f))
                } else {
                    None
                }
            }
            (VariableKind::Object(current), other) if !other.is_primitive() => {
                narrow_object(current, other).map(VariableKind::Object)
            }
            _ => None,
        };
        if let Some(kind) = narrowed {
            self.constraints[root] = kind;
        }
    }

    /// `id = other`: `id` accepts what `other` may hold; the two are linked.
    pub fn variable_on_right(&mut self, id: VariableId, other: VariableId) {
        self.link(id, other, |p| p.right_flags());
    }

    /// `other = id`: `id` is constrained by where `other` is stored; linked.
    pub fn variable_on_left(&mut self, id: VariableId, other: VariableId) {
        self.link(id, other, |p| p.left_flags());
    }

    fn link(&mut self, id: VariableId, other: VariableId, side: fn(&PrimitiveType) -> PrimitiveFlags) {
        let (a, b) = (self.root(id), self.root(other));
        if a == b {
            return;
        }
        let combined = match (self.kind(id), self.kind(other)) {
            (VariableKind::Primitive(mine), VariableKind::Primitive(theirs)) => {
                let theirs = primitive::from_flags(*theirs)
                    .map(|t| side(&t))
                    .unwrap_or(*theirs);
                let both = *mine & theirs;
                VariableKind::Primitive(if both.is_empty() { *mine } else { both })
            }
            (VariableKind::Object(mine), VariableKind::Object(theirs)) => {
                VariableKind::Object(narrow_object(mine, theirs).unwrap_or_else(|| mine.clone()))
            }
            _ => return,
        };
        log::trace!("linking bindings {} and {}", id, other);
        self.parents[b] = a;
        self.constraints[a] = combined;
    }
}

fn is_plain_object(ty: &Type) -> bool {
    match ty {
        Type::Object(o) => o.dimension == 0 && o.internal_name == TYPE_OBJECT.internal_name,
        _ => false,
    }
}

fn narrow_object(current: &Type, other: &Type) -> Option<Type> {
    let current_undefined = matches!(current, Type::Object(o) if o.undefined);
    let other_undefined = matches!(other, Type::Object(o) if o.undefined);
    if other_undefined || current == other {
        return None;
    }
    if current_undefined || is_plain_object(current) {
        Some(other.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::types::{TYPE_STRING, TYPE_UNDEFINED_OBJECT};

    fn int() -> Type {
        Type::Primitive(PrimitiveType::INT)
    }

    #[test]
    fn test_assignment_creates_then_reuses() {
        let mut locals = LocalVariables::new();
        let a = locals.in_assignment(1, 3, &Type::Primitive(PrimitiveType::MAYBE_BYTE));
        let b = locals.in_assignment(1, 9, &Type::Primitive(PrimitiveType::MAYBE_BOOLEAN));
        assert_eq!(a, b);
        assert_eq!(locals.get(1, 20), Some(a));
        assert_eq!(locals.get(1, 2), None);
    }

    #[test]
    fn test_incompatible_assignment_starts_new_binding() {
        let mut locals = LocalVariables::new();
        let a = locals.in_assignment(2, 3, &int());
        let b = locals.in_assignment(2, 10, &Type::Object(TYPE_STRING.clone()));
        assert_ne!(a, b);
        assert_eq!(locals.get(2, 12), Some(b));
        assert_eq!(locals.get(2, 5), Some(a));
    }

    #[test]
    fn test_type_on_left_narrows() {
        let mut locals = LocalVariables::new();
        let id = locals.in_assignment(1, 0, &Type::Primitive(PrimitiveType::MAYBE_BOOLEAN));
        locals.type_on_left(id, &Type::Primitive(PrimitiveType::MAYBE_BYTE));
        assert_eq!(locals.variable_type(id), Type::Primitive(PrimitiveType::MAYBE_BYTE));
        locals.type_on_right(id, &int());
        assert_eq!(locals.variable_type(id), int());
    }

    #[test]
    fn test_declared_binding_keeps_type() {
        let mut locals = LocalVariables::new();
        let id = locals.declare(1, 0, 10, Some("b"), &Type::Primitive(PrimitiveType::BYTE));
        locals.type_on_left(id, &int());
        assert_eq!(locals.variable_type(id), Type::Primitive(PrimitiveType::BYTE));
        assert!(locals.contains_name("b"));
    }

    #[test]
    fn test_linking_shares_constraint() {
        let mut locals = LocalVariables::new();
        let a = locals.in_assignment(1, 0, &Type::Primitive(PrimitiveType::MAYBE_BOOLEAN));
        let b = locals.in_assignment(2, 0, &Type::Primitive(PrimitiveType::MAYBE_BOOLEAN));
        locals.variable_on_right(a, b);
        assert!(locals.are_linked(a, b));
        locals.type_on_right(b, &Type::Primitive(PrimitiveType::BOOLEAN));
        assert_eq!(locals.variable_type(a), Type::Primitive(PrimitiveType::BOOLEAN));
    }

    #[test]
    fn test_null_assignment_then_object() {
        let mut locals = LocalVariables::new();
        let id = locals.in_null_assignment(3, 0, &Type::Object(TYPE_UNDEFINED_OBJECT.clone()));
        let same = locals.in_assignment(3, 8, &Type::Object(TYPE_STRING.clone()));
        assert_eq!(id, same);
        assert_eq!(locals.variable_type(id), Type::Object(TYPE_STRING.clone()));
    }

    #[test]
    fn test_remove() {
        let mut locals = LocalVariables::new();
        let id = locals.in_assignment(1, 0, &int());
        locals.remove(id);
        assert!(locals.is_removed(id));
        assert_eq!(locals.get(1, 4), None);
    }
}
