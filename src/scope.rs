use indexmap::IndexSet;
use std::collections::HashSet;
use swc_core::{
    common::{sync::Lrc, BytePos, Mark, SourceFile, SourceMap, Span, SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};

use crate::options::Options;

// -----------------------------------------------------------------------------
// Names
// -----------------------------------------------------------------------------

const GLOBAL_NAMES: [&str; 3] = ["undefined", "NaN", "Infinity"];

// Host-injected aliases: rewritten like any free name but never reported.
const RESERVED_ALIASES: [&str; 3] = ["args", "globals", "$$"];

const UID_STEM: &str = "_";

fn is_reserved_alias(name: &str) -> bool {
    RESERVED_ALIASES.contains(&name)
}

/// First of `stem`, `stem1`, `stem2`, … not used anywhere in `expr` and not
/// listed as unscopable.
pub fn generate_uid(stem: &str, expr: &Expr, options: &Options) -> String {
    let mut pool = NamePool::default();
    expr.visit_with(&mut pool);
    pool.names.extend(options.unscopables.iter().cloned());

    let mut candidate = stem.to_string();
    let mut n = 0;
    while pool.names.contains(&candidate) {
        n += 1;
        candidate = format!("{stem}{n}");
    }
    candidate
}

#[derive(Default)]
struct NamePool {
    names: HashSet<String>,
}

impl Visit for NamePool {
    fn visit_ident(&mut self, i: &Ident) {
        self.names.insert(i.sym.to_string());
    }

    fn visit_ident_name(&mut self, i: &IdentName) {
        self.names.insert(i.sym.to_string());
    }
}

// -----------------------------------------------------------------------------
// Rewrite output
// -----------------------------------------------------------------------------

/// 1-based line, 0-based column in the caller's source. Columns count UTF-16
/// code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRecord {
    pub position: Position,
    pub name: String,
    /// `{x}` standing for `{x: x}`, in an object literal or pattern
    pub shorthand: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RewriteMode {
    /// Leave free identifiers in the tree; the repairer grafts the scope prefix
    /// into the generated text.
    #[default]
    Graft,
    /// Replace free identifiers with `uid.name` member expressions.
    Replace,
}

pub struct Rewritten {
    /// `function (uid) { return <expr>; }`
    pub expr: Box<Expr>,
    pub uid: String,
    pub records: Vec<RewriteRecord>,
    pub vars: IndexSet<String>,
    /// `this` was replaced with `Options::this_var_name`.
    pub generated_this_var: bool,
}

// -----------------------------------------------------------------------------
// Rewriter
// -----------------------------------------------------------------------------

pub struct ScopeRewriter<'a> {
    cm: Lrc<SourceMap>,
    unresolved_mark: Mark,
    options: &'a Options,
    mode: RewriteMode,

    uid: String,
    // Real function boundaries entered below the synthetic one.
    fn_depth: usize,
    uses_scope: bool,
    generated_this_var: bool,
    records: Vec<RewriteRecord>,
    vars: IndexSet<String>,
}

impl<'a> ScopeRewriter<'a> {
    pub fn new(cm: Lrc<SourceMap>, unresolved_mark: Mark, options: &'a Options, mode: RewriteMode) -> Self {
        Self {
            cm,
            unresolved_mark,
            options,
            mode,
            uid: UID_STEM.to_string(),
            fn_depth: 0,
            uses_scope: false,
            generated_this_var: false,
            records: vec![],
            vars: IndexSet::new(),
        }
    }

    /// Wrap `expr` in a function boundary and rewrite it. `expr` must have been
    /// through the resolver that produced `unresolved_mark`.
    pub fn rewrite(mut self, expr: Box<Expr>) -> Rewritten {
        self.uid = generate_uid(UID_STEM, &expr, self.options);

        let mut function = wrap_in_function(expr);
        if let Some(body) = &mut function.body {
            body.visit_mut_with(&mut self);
        }
        if self.uses_scope {
            function.params.push(Param {
                span: DUMMY_SP,
                decorators: vec![],
                pat: Pat::Ident(BindingIdent {
                    id: Ident::new(self.uid.clone().into(), DUMMY_SP, SyntaxContext::empty()),
                    type_ann: None,
                }),
            });
        }

        tracing::debug!(uid = %self.uid, records = self.records.len(), vars = ?self.vars, "rewrote expression scope");

        Rewritten {
            expr: Box::new(Expr::Fn(FnExpr { ident: None, function })),
            uid: self.uid,
            records: self.records,
            vars: self.vars,
            generated_this_var: self.generated_this_var,
        }
    }

    fn within_function(&mut self, f: impl FnOnce(&mut Self)) {
        self.fn_depth += 1;
        f(self);
        self.fn_depth -= 1;
    }

    fn is_free(&self, ident: &Ident) -> bool {
        let name: &str = &ident.sym;
        !self.options.keep_scope
            && ident.ctxt.outer() == self.unresolved_mark
            && name != self.uid.as_str()
            && !GLOBAL_NAMES.contains(&name)
            && !self.options.is_unscopable(name)
    }

    fn is_reported(&self, name: &str) -> bool {
        !is_reserved_alias(name) && !self.options.is_unscopable(name)
    }

    fn record(&mut self, ident: &Ident, shorthand: bool) {
        let loc = self.cm.lookup_char_pos(ident.span.lo);
        let line = loc.line as u32;
        let column = utf16_column(&loc.file, ident.span.lo);
        // line 1 starts with the synthetic "("
        let column = if line == 1 { column.saturating_sub(1) } else { column };

        self.records.push(RewriteRecord {
            position: Position { line, column },
            name: ident.sym.to_string(),
            shorthand,
        });
        if !is_reserved_alias(&ident.sym) {
            self.vars.insert(ident.sym.to_string());
        }
        self.uses_scope = true;
    }

    fn this_replacement(&mut self, span: Span) -> Ident {
        let name = if self.options.keep_scope {
            self.generated_this_var = true;
            self.options.this_var_name.clone()
        } else {
            self.uses_scope = true;
            self.uid.clone()
        };
        Ident::new(name.into(), span, SyntaxContext::empty())
    }

    fn scope_member(&self, ident: &Ident) -> MemberExpr {
        MemberExpr {
            span: ident.span,
            obj: Box::new(Expr::Ident(Ident::new(
                self.uid.clone().into(),
                DUMMY_SP,
                SyntaxContext::empty(),
            ))),
            prop: MemberProp::Ident(IdentName::new(ident.sym.clone(), ident.span)),
        }
    }
}

/// Column of `pos` on its line, in UTF-16 code units.
fn utf16_column(file: &SourceFile, pos: BytePos) -> u32 {
    let start = (file.line_begin_pos(pos).0 - file.start_pos.0) as usize;
    let end = (pos.0 - file.start_pos.0) as usize;
    file.src.get(start..end).map_or(0, |s| s.encode_utf16().count() as u32)
}

fn wrap_in_function(expr: Box<Expr>) -> Box<Function> {
    Box::new(Function {
        params: vec![],
        decorators: vec![],
        span: DUMMY_SP,
        body: Some(BlockStmt {
            span: DUMMY_SP,
            stmts: vec![Stmt::Return(ReturnStmt {
                span: DUMMY_SP,
                arg: Some(expr),
            })],
            ctxt: SyntaxContext::empty(),
        }),
        is_generator: false,
        is_async: false,
        type_params: None,
        return_type: None,
        ctxt: SyntaxContext::empty(),
    })
}

impl VisitMut for ScopeRewriter<'_> {
    // ---------- boundaries (arrows are transparent to `this`) ----------

    fn visit_mut_function(&mut self, n: &mut Function) {
        self.within_function(|v| n.visit_mut_children_with(v));
    }

    fn visit_mut_constructor(&mut self, n: &mut Constructor) {
        self.within_function(|v| n.visit_mut_children_with(v));
    }

    fn visit_mut_getter_prop(&mut self, n: &mut GetterProp) {
        n.key.visit_mut_with(self);
        self.within_function(|v| n.body.visit_mut_with(v));
    }

    fn visit_mut_setter_prop(&mut self, n: &mut SetterProp) {
        n.key.visit_mut_with(self);
        self.within_function(|v| {
            n.param.visit_mut_with(v);
            n.body.visit_mut_with(v);
        });
    }

    fn visit_mut_class_prop(&mut self, n: &mut ClassProp) {
        n.key.visit_mut_with(self);
        self.within_function(|v| n.value.visit_mut_with(v));
    }

    fn visit_mut_private_prop(&mut self, n: &mut PrivateProp) {
        self.within_function(|v| n.value.visit_mut_with(v));
    }

    fn visit_mut_static_block(&mut self, n: &mut StaticBlock) {
        self.within_function(|v| n.body.visit_mut_with(v));
    }

    // ---------- references ----------

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::This(this) if self.fn_depth == 0 => {
                let span = this.span;
                *expr = Expr::Ident(self.this_replacement(span));
                return;
            }
            Expr::Member(member) if self.fn_depth == 0 && !self.options.keep_scope => {
                if let (Expr::This(_), MemberProp::Ident(prop)) = (&*member.obj, &member.prop) {
                    if self.is_reported(&prop.sym) {
                        self.vars.insert(prop.sym.to_string());
                    }
                }
            }
            Expr::Ident(ident) if self.is_free(ident) => {
                let ident = ident.clone();
                self.record(&ident, false);
                if self.mode == RewriteMode::Replace {
                    *expr = Expr::Member(self.scope_member(&ident));
                }
                return;
            }
            _ => {}
        }
        expr.visit_mut_children_with(self);
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop {
            if self.is_free(ident) {
                let ident = ident.clone();
                self.record(&ident, true);
                if self.mode == RewriteMode::Replace {
                    *prop = Prop::KeyValue(KeyValueProp {
                        key: PropName::Ident(IdentName::new(ident.sym.clone(), ident.span)),
                        value: Box::new(Expr::Member(self.scope_member(&ident))),
                    });
                }
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_simple_assign_target(&mut self, target: &mut SimpleAssignTarget) {
        if let SimpleAssignTarget::Ident(binding) = target {
            if self.is_free(&binding.id) {
                let ident = binding.id.clone();
                self.record(&ident, false);
                if self.mode == RewriteMode::Replace {
                    *target = SimpleAssignTarget::Member(self.scope_member(&ident));
                }
                return;
            }
        }
        target.visit_mut_children_with(self);
    }

    // ---------- destructuring targets ----------

    fn visit_mut_pat(&mut self, pat: &mut Pat) {
        if let Pat::Ident(binding) = pat {
            if self.is_free(&binding.id) {
                let ident = binding.id.clone();
                self.record(&ident, false);
                if self.mode == RewriteMode::Replace {
                    *pat = Pat::Expr(Box::new(Expr::Member(self.scope_member(&ident))));
                }
                return;
            }
        }
        pat.visit_mut_children_with(self);
    }

    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        let ObjectPatProp::Assign(assign) = prop else {
            prop.visit_mut_children_with(self);
            return;
        };
        if !self.is_free(&assign.key.id) {
            assign.value.visit_mut_with(self);
            return;
        }

        let ident = assign.key.id.clone();
        self.record(&ident, true);
        assign.value.visit_mut_with(self);
        if self.mode == RewriteMode::Replace {
            let target = Box::new(Pat::Expr(Box::new(Expr::Member(self.scope_member(&ident)))));
            let value = match assign.value.take() {
                Some(default) => Box::new(Pat::Assign(AssignPat {
                    span: assign.span,
                    left: target,
                    right: default,
                })),
                None => target,
            };
            *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                key: PropName::Ident(IdentName::new(ident.sym.clone(), ident.span)),
                value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::generate;
    use crate::parse::parse_expression;
    use swc_core::common::{Globals, GLOBALS};

    fn rewrite(source: &str, options: &Options, mode: RewriteMode) -> Rewritten {
        let parsed = parse_expression(source, "expr.js").unwrap();
        ScopeRewriter::new(parsed.cm.clone(), parsed.unresolved_mark, options, mode).rewrite(parsed.expr)
    }

    fn print(source: &str, options: &Options, mode: RewriteMode) -> String {
        let parsed = parse_expression(source, "expr.js").unwrap();
        let rewritten =
            ScopeRewriter::new(parsed.cm.clone(), parsed.unresolved_mark, options, mode).rewrite(parsed.expr);
        generate(rewritten.expr, &parsed.cm, &parsed.file, "expr.js").unwrap().code
    }

    fn pos(line: u32, column: u32) -> Position {
        Position { line, column }
    }

    #[test]
    fn records_free_identifiers_in_source_order() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("a + b * a", &Options::default(), RewriteMode::Graft);
            let seen: Vec<(Position, &str)> = out.records.iter().map(|r| (r.position, r.name.as_str())).collect();
            assert_eq!(seen, vec![(pos(1, 0), "a"), (pos(1, 4), "b"), (pos(1, 8), "a")]);
            assert_eq!(out.vars.iter().collect::<Vec<_>>(), vec!["a", "b"]);
            assert_eq!(out.uid, "_");
        });
    }

    #[test]
    fn only_the_first_line_is_shifted() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("a +\n  b", &Options::default(), RewriteMode::Graft);
            let seen: Vec<Position> = out.records.iter().map(|r| r.position).collect();
            assert_eq!(seen, vec![pos(1, 0), pos(2, 2)]);
        });
    }

    #[test]
    fn bound_and_global_names_stay_untouched() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite(
                "list.map(x => x + offset + undefined + NaN + Infinity + require('y'))",
                &Options::default(),
                RewriteMode::Graft,
            );
            let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["list", "offset"]);
        });
    }

    #[test]
    fn member_properties_and_keys_are_not_references() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("({ key: a.b.c, [d]: 1 })", &Options::default(), RewriteMode::Graft);
            assert_eq!(out.vars.iter().collect::<Vec<_>>(), vec!["a", "d"]);
        });
    }

    #[test]
    fn reserved_aliases_are_rewritten_but_not_reported() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("args[0] + globals.x + $$ + y", &Options::default(), RewriteMode::Graft);
            assert_eq!(out.records.len(), 4);
            assert_eq!(out.vars.iter().collect::<Vec<_>>(), vec!["y"]);
        });
    }

    #[test]
    fn shorthand_and_assignment_targets() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("({ x }, y = 1, z += 2)", &Options::default(), RewriteMode::Graft);
            let seen: Vec<(&str, bool)> = out.records.iter().map(|r| (r.name.as_str(), r.shorthand)).collect();
            assert_eq!(seen, vec![("x", true), ("y", false), ("z", false)]);
        });
    }

    #[test]
    fn this_member_reports_its_property() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("this.a + this.args + this['b']", &Options::default(), RewriteMode::Graft);
            assert!(out.records.is_empty());
            assert_eq!(out.vars.iter().collect::<Vec<_>>(), vec!["a"]);
            assert!(!out.generated_this_var);
        });
    }

    #[test]
    fn this_inside_nested_function_keeps_its_own_binding() {
        GLOBALS.set(&Globals::new(), || {
            let code = print(
                "[function () { return this.x; }, () => this.y]",
                &Options::default(),
                RewriteMode::Replace,
            );
            assert!(code.contains("return this.x;"), "{code}");
            assert!(code.contains("=>_.y") || code.contains("=> _.y"), "{code}");
        });
    }

    #[test]
    fn no_parameter_without_scope_access() {
        GLOBALS.set(&Globals::new(), || {
            let code = print("1 + 2", &Options::default(), RewriteMode::Graft);
            assert!(!code.contains('_'), "{code}");
            assert!(code.contains("return 1 + 2;"), "{code}");
        });
    }

    #[test]
    fn uid_avoids_existing_names() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("_ + _1 + x", &Options::default(), RewriteMode::Graft);
            assert_eq!(out.uid, "_2");
            let mut options = Options::default();
            options.unscopables = vec!["_".into()];
            assert_eq!(rewrite("x", &options, RewriteMode::Graft).uid, "_1");
        });
    }

    #[test]
    fn keep_scope_only_redirects_this() {
        GLOBALS.set(&Globals::new(), || {
            let options = Options {
                keep_scope: true,
                ..Options::default()
            };
            let out = rewrite("this.a + b", &options, RewriteMode::Replace);
            assert!(out.records.is_empty());
            assert!(out.vars.is_empty());
            assert!(out.generated_this_var);

            let code = print("this.a + b", &options, RewriteMode::Replace);
            assert!(code.contains("return _this.a + b;"), "{code}");
            assert!(code.starts_with("function()") || code.starts_with("function ()"), "{code}");
        });
    }

    #[test]
    fn replace_mode_builds_member_expressions() {
        GLOBALS.set(&Globals::new(), || {
            let code = print("a = b + { c }", &Options::default(), RewriteMode::Replace);
            assert!(code.contains("_.a = _.b +"), "{code}");
            assert!(code.contains("c: _.c"), "{code}");
        });
    }

    #[test]
    fn destructuring_targets_are_references() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("[a, ...r] = ({ x: b, c, d = e } = f)", &Options::default(), RewriteMode::Graft);
            let seen: Vec<(&str, bool)> = out.records.iter().map(|r| (r.name.as_str(), r.shorthand)).collect();
            assert_eq!(
                seen,
                vec![("a", false), ("r", false), ("b", false), ("c", true), ("d", true), ("e", false), ("f", false)]
            );
            assert_eq!(out.vars.iter().collect::<Vec<_>>(), vec!["a", "r", "b", "c", "d", "e", "f"]);
        });
    }

    #[test]
    fn replace_mode_rewrites_destructuring_targets() {
        GLOBALS.set(&Globals::new(), || {
            let code = print("[a] = b", &Options::default(), RewriteMode::Replace);
            assert!(code.contains("[_.a] = _.b"), "{code}");

            let code = print("({ x: a, c, d = 1 } = b)", &Options::default(), RewriteMode::Replace);
            assert!(code.contains("x: _.a"), "{code}");
            assert!(code.contains("c: _.c"), "{code}");
            assert!(code.contains("d: _.d = 1"), "{code}");
        });
    }

    #[test]
    fn bound_pattern_names_stay_local() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("(({ a }, [b]) => a + b + c)", &Options::default(), RewriteMode::Graft);
            let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["c"]);
        });
    }

    #[test]
    fn record_columns_count_utf16_units() {
        GLOBALS.set(&Globals::new(), || {
            let out = rewrite("'😀' + a", &Options::default(), RewriteMode::Graft);
            assert_eq!(out.records[0].position, pos(1, 7));
        });
    }
}
