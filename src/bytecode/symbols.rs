//! Compile-time symbol tables.
//!
//! These live only as long as a [`Compiler`](super::compile::Compiler); the
//! runtime sees nothing but slots and frame offsets baked into the code.

use std::collections::HashMap;

use super::ir::FuncInfo;

/// A global variable: one storage cell for the whole run, addressed by slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalVariableDef {
    pub slot: usize,
}

/// A function parameter or local. Owns no storage, only a resolution
/// coordinate into the current call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariableDef {
    /// Declaration order within the function; parameters come first.
    pub ordinal: usize,
    pub is_parameter: bool,
    /// Final frame offset. `None` until
    /// [`FuncDef::set_stack_index_for_local_vars`] has run.
    pub stack_index: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub code_index: usize,
    pub param_count: usize,
    locals: HashMap<String, LocalVariableDef>,
}

impl FuncDef {
    pub fn new(name: impl Into<String>, code_index: usize) -> Self {
        Self {
            name: name.into(),
            code_index,
            param_count: 0,
            locals: HashMap::new(),
        }
    }

    /// Returns `None` if the name is already taken in this function.
    pub fn add_parameter(&mut self, name: &str) -> Option<LocalVariableDef> {
        let def = self.add(name, true)?;
        self.param_count += 1;
        Some(def)
    }

    /// Returns `None` if the name is already taken in this function.
    pub fn add_local(&mut self, name: &str) -> Option<LocalVariableDef> {
        self.add(name, false)
    }

    fn add(&mut self, name: &str, is_parameter: bool) -> Option<LocalVariableDef> {
        if self.locals.contains_key(name) {
            return None;
        }
        let def = LocalVariableDef {
            ordinal: self.locals.len(),
            is_parameter,
            stack_index: None,
        };
        self.locals.insert(name.to_string(), def);
        Some(def)
    }

    pub fn local(&self, name: &str) -> Option<&LocalVariableDef> {
        self.locals.get(name)
    }

    pub fn local_count(&self) -> usize {
        self.locals.len() - self.param_count
    }

    /// Assign frame offsets once the full parameter and local set is known.
    ///
    /// Frame layout, growing upwards:
    /// `[arg0 .. argN-1] [return address] [saved bp] <bp> [local0 .. localM-1]`
    ///
    /// Parameter `i` gets `param_count - i + 1`, local `k` gets `-1 - k`, so
    /// that the absolute slot is always `bp - 1 - stack_index`.
    pub fn set_stack_index_for_local_vars(&mut self) {
        let param_count = self.param_count as i32;
        for def in self.locals.values_mut() {
            let ordinal = def.ordinal as i32;
            def.stack_index = Some(if def.is_parameter {
                param_count - ordinal + 1
            } else {
                -1 - (ordinal - param_count)
            });
        }
    }

    pub fn info(&self) -> FuncInfo {
        FuncInfo {
            name: self.name.clone(),
            code_index: self.code_index,
            param_count: self.param_count,
            local_count: self.local_count(),
        }
    }
}

/// Global name → slot table.
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    defs: HashMap<String, GlobalVariableDef>,
    names: Vec<String>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a global; re-declaring an existing name reuses its slot.
    pub fn declare(&mut self, name: &str) -> GlobalVariableDef {
        if let Some(def) = self.defs.get(name) {
            return *def;
        }
        let def = GlobalVariableDef {
            slot: self.names.len(),
        };
        self.names.push(name.to_string());
        self.defs.insert(name.to_string(), def);
        def
    }

    pub fn get(&self, name: &str) -> Option<GlobalVariableDef> {
        self.defs.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_and_locals_offsets() {
        let mut f = FuncDef::new("f", 10);
        f.add_parameter("a").unwrap();
        f.add_parameter("b").unwrap();
        f.add_local("x").unwrap();
        f.add_local("y").unwrap();

        assert_eq!(f.param_count, 2);
        assert_eq!(f.local_count(), 2);
        assert_eq!(f.local("a").unwrap().stack_index, None);

        f.set_stack_index_for_local_vars();

        assert_eq!(f.local("a").unwrap().stack_index, Some(3));
        assert_eq!(f.local("b").unwrap().stack_index, Some(2));
        assert_eq!(f.local("x").unwrap().stack_index, Some(-1));
        assert_eq!(f.local("y").unwrap().stack_index, Some(-2));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut f = FuncDef::new("f", 0);
        assert!(f.add_parameter("a").is_some());
        assert!(f.add_parameter("a").is_none());
        assert!(f.add_local("a").is_none());
        assert_eq!(f.param_count, 1);
    }

    #[test]
    fn test_info_snapshot() {
        let mut f = FuncDef::new("g", 4);
        f.add_parameter("n").unwrap();
        f.add_local("acc").unwrap();

        let info = f.info();
        assert_eq!(info.name, "g");
        assert_eq!(info.code_index, 4);
        assert_eq!(info.param_count, 1);
        assert_eq!(info.local_count, 1);
    }

    #[test]
    fn test_global_redeclare_reuses_slot() {
        let mut globals = GlobalTable::new();
        let x = globals.declare("x");
        let y = globals.declare("y");
        let x_again = globals.declare("x");

        assert_eq!(x.slot, 0);
        assert_eq!(y.slot, 1);
        assert_eq!(x_again, x);
        assert_eq!(globals.len(), 2);
        assert_eq!(globals.get("y"), Some(y));
        assert_eq!(globals.get("z"), None);
        assert_eq!(globals.into_names(), vec!["x".to_string(), "y".to_string()]);
    }
}
