//! Per-function emission state: the growing frame, the lexical scope
//! chain, and the loop-label stacks `Break`/`Continue` jump through.

use std::collections::BTreeMap;

pub struct FunctionContext {
    pub name: String,
    /// Bytes of locals and spill slots handed out so far. The prologue is
    /// emitted after the body, once this has reached its final value.
    pub stack_size: i32,
    scopes: Vec<BTreeMap<String, i32>>,
    loop_start_labels: Vec<String>,
    loop_end_labels: Vec<String>,
}

impl FunctionContext {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stack_size: 0,
            scopes: Vec::new(),
            loop_start_labels: Vec::new(),
            loop_end_labels: Vec::new(),
        }
    }

    /// Claim the next 4-byte slot and return its offset.
    pub fn allocate_slot(&mut self) -> i32 {
        let offset = self.stack_size;
        self.stack_size += 4;
        offset
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind `name` in the innermost scope, shadowing any outer binding.
    pub fn add_var(&mut self, name: &str, offset: i32) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), offset);
        }
    }

    /// Search the scope chain innermost-out.
    pub fn find_var(&self, name: &str) -> Option<i32> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn enter_loop(&mut self, start_label: String, end_label: String) {
        self.loop_start_labels.push(start_label);
        self.loop_end_labels.push(end_label);
    }

    pub fn exit_loop(&mut self) {
        self.loop_start_labels.pop();
        self.loop_end_labels.pop();
    }

    pub fn current_loop_start(&self) -> Option<&str> {
        self.loop_start_labels.last().map(String::as_str)
    }

    pub fn current_loop_end(&self) -> Option<&str> {
        self.loop_end_labels.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_advance_by_four() {
        let mut ctx = FunctionContext::new("f");
        assert_eq!(ctx.allocate_slot(), 0);
        assert_eq!(ctx.allocate_slot(), 4);
        assert_eq!(ctx.stack_size, 8);
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut ctx = FunctionContext::new("f");
        ctx.push_scope();
        ctx.add_var("x", 0);
        ctx.push_scope();
        ctx.add_var("x", 4);
        assert_eq!(ctx.find_var("x"), Some(4));
        ctx.pop_scope();
        assert_eq!(ctx.find_var("x"), Some(0));
        assert_eq!(ctx.find_var("y"), None);
    }

    #[test]
    fn loop_labels_nest() {
        let mut ctx = FunctionContext::new("f");
        assert!(ctx.current_loop_end().is_none());
        ctx.enter_loop("while_start_0".into(), "while_end_0".into());
        ctx.enter_loop("while_start_1".into(), "while_end_1".into());
        assert_eq!(ctx.current_loop_start(), Some("while_start_1"));
        ctx.exit_loop();
        assert_eq!(ctx.current_loop_end(), Some("while_end_0"));
    }
}
