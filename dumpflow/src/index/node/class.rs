use super::Node;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::{
    ClassKind, JavaClass, JavaClassLoader, JavaField, JavaMethod, JavaRuntime, JavaStaticField,
};

/// `class` and `arrayclass`.
pub(super) fn open(ctx: &mut Context, attrs: &Attributes, array: bool) -> Result<Node> {
    let mut class = JavaClass::new(attrs.required_address("id")?, class_kind(attrs, array)?);
    class.name = attrs.string("name");
    class.superclass = attrs.address("super")?;
    class.loader = attrs.address("loader")?;
    class.object = attrs.address("obj")?;
    class.instance_size = attrs.u64("instanceSize")?;
    class.modifiers = attrs.u32("modifiers")?;
    class.source = attrs.string("source");
    // only written by runtimes built with a hashcode slot
    class.hashcode_slot = attrs.optional_long("hashcodeSlot")?.unwrap_or(0) as u64;

    let class = ctx.runtime_mut()?.add_class(class);
    Ok(Node::Class { class })
}

fn class_kind(attrs: &Attributes, array: bool) -> Result<ClassKind> {
    if !array {
        return Ok(ClassKind::Class);
    }
    Ok(ClassKind::Array {
        leaf_class: attrs.address("leafClass")?,
        arity: attrs.u32("arity")?,
        first_element_offset: attrs.u64("firstElementOffset")?,
        size_offset: attrs.u64("sizeOffset")?,
        size_bytes: attrs.u64("sizeBytes")?,
    })
}

fn class_mut<'a>(runtime: &'a mut JavaRuntime, class: usize) -> Result<&'a mut JavaClass> {
    runtime
        .class_at_mut(class)
        .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::NotFound))
}

pub(super) fn open_field(ctx: &mut Context, class: usize, attrs: &Attributes) -> Result<Node> {
    let field = JavaField {
        name: attrs.required("name")?.to_string(),
        signature: attrs.string("sig").unwrap_or_default(),
        modifiers: attrs.u32("modifiers")?,
        offset: attrs.u64("offset")?,
    };
    class_mut(ctx.runtime_mut()?, class)?.fields.push(field);
    Ok(Node::Field)
}

pub(super) fn open_static(ctx: &mut Context, class: usize, attrs: &Attributes) -> Result<Node> {
    let field = JavaStaticField {
        name: attrs.required("name")?.to_string(),
        signature: attrs.string("sig").unwrap_or_default(),
        modifiers: attrs.u32("modifiers")?,
        value: attrs.long("value", 0)?,
    };
    class_mut(ctx.runtime_mut()?, class)?.statics.push(field);
    Ok(Node::StaticField)
}

pub(super) fn open_method(ctx: &mut Context, class: usize, attrs: &Attributes) -> Result<Node> {
    let method = JavaMethod {
        id: attrs.address("id")?,
        name: attrs.required("name")?.to_string(),
        signature: attrs.string("sig").unwrap_or_default(),
        modifiers: attrs.u32("modifiers")?,
    };
    class_mut(ctx.runtime_mut()?, class)?.methods.push(method);
    Ok(Node::Method)
}

pub(super) fn open_loader(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let loader = JavaClassLoader::new(attrs.required_address("id")?, attrs.address("obj")?);
    let loader = ctx.runtime_mut()?.add_class_loader(loader);
    Ok(Node::ClassLoader { loader })
}

pub(super) fn open_cached(ctx: &mut Context, loader: usize, attrs: &Attributes) -> Result<Node> {
    let class = attrs.required_address("id")?;
    ctx.runtime_mut()?
        .class_loader_at_mut(loader)
        .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::NotFound))?
        .cached_classes
        .push(class);
    Ok(Node::CachedClass)
}
