//! Kernel attribute and metadata accessors.
//!
//! Kernel-ness, the degenerate-sub-groups marker, and function lineage
//! are all stored as string attributes on the function, so they survive
//! cloning for free and print with the function.

use skein_ir::{FuncId, Function, Module};

/// Marks a function as a kernel; the value "entry-point" additionally
/// marks it as an entry point of the module.
pub const KERNEL_ATTR: &str = "mux-kernel";

/// Present on kernels that execute with degenerate sub-groups (the
/// sub-group is the whole work-group).
pub const DEGENERATE_SUBGROUPS_ATTR: &str = "mux-degenerate-subgroups";

/// Records the original name of a function across renames and clones.
pub const BASE_FN_NAME_ATTR: &str = "mux-base-fn-name";

pub fn set_is_kernel_entry_pt(f: &mut Function) {
    f.set_attr(KERNEL_ATTR, "entry-point");
}

pub fn is_kernel_entry_pt(f: &Function) -> bool {
    f.attr(KERNEL_ATTR) == Some("entry-point")
}

/// True for any kernel, entry point or not.
pub fn is_kernel(f: &Function) -> bool {
    f.attr(KERNEL_ATTR).is_some()
}

pub fn set_has_degenerate_subgroups(f: &mut Function) {
    f.set_attr(DEGENERATE_SUBGROUPS_ATTR, "");
}

pub fn has_degenerate_subgroups(f: &Function) -> bool {
    f.attr(DEGENERATE_SUBGROUPS_ATTR).is_some()
}

pub fn clear_has_degenerate_subgroups(f: &mut Function) {
    f.remove_attr(DEGENERATE_SUBGROUPS_ATTR);
}

pub fn set_base_fn_name(f: &mut Function, base: &str) {
    f.set_attr(BASE_FN_NAME_ATTR, base);
}

pub fn base_fn_name(f: &Function) -> Option<&str> {
    f.attr(BASE_FN_NAME_ATTR)
}

/// The recorded base name, falling back to the function's own name.
pub fn get_base_fn_name_or_fn_name(f: &Function) -> &str {
    base_fn_name(f).unwrap_or_else(|| f.name())
}

/// Propagate lineage from `old_f` to `new_f`: the base name is `old_f`'s
/// recorded base name (or its plain name), set on `new_f` and returned.
pub fn get_or_set_base_fn_name(module: &mut Module, new_f: FuncId, old_f: FuncId) -> String {
    let base = get_base_fn_name_or_fn_name(module.func(old_f)).to_owned();
    set_base_fn_name(module.func_mut(new_f), &base);
    base
}

/// Compile-time required work-group size, when the front end recorded
/// one.
pub fn local_size_metadata(f: &Function) -> Option<[u32; 3]> {
    f.local_size()
}

pub fn set_local_size_metadata(f: &mut Function, size: [u32; 3]) {
    f.set_local_size(Some(size));
}
