//! Property-based tests for the builder
//!
//! Invariants that should hold for ANY well-formed desugared tree:
//! - Validity: the finished graph passes the verifier
//! - Determinism: lowering the same tree twice renders identically
//! - Reachability: reverse postorder covers every block, entry first

mod common;

use common::*;
use gradual_cfg::features::ast::{mk, Expr, LocalRef, MethodDef, UnsupportedConstruct};
use gradual_cfg::LoweringConfig;
use proptest::prelude::*;

/// Shape of a tree, turned into an [`Expr`] once a fixture is at hand
#[derive(Debug, Clone)]
enum Node {
    Int(i64),
    Nil,
    True,
    SelfRef,
    Local(usize),
    Unsupported(usize),
    Break(Option<Box<Node>>),
    Next(Option<Box<Node>>),
    Return(Option<Box<Node>>),
    Assign(usize, Box<Node>),
    If(Box<Node>, Box<Node>, Option<Box<Node>>),
    While(Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Call(Box<Node>, Vec<Node>),
    Closure(Box<Node>, bool),
    Seq(Vec<Node>, Box<Node>),
    Rescue(Box<Node>, bool, Option<Box<Node>>),
    Array(Vec<Node>),
}

const LOCALS: [&str; 3] = ["a", "b", "c"];

fn node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        (-3i64..3).prop_map(Node::Int),
        Just(Node::Nil),
        Just(Node::True),
        Just(Node::SelfRef),
        (0..LOCALS.len()).prop_map(Node::Local),
        (0..UnsupportedConstruct::ALL.len()).prop_map(Node::Unsupported),
        Just(Node::Break(None)),
        Just(Node::Next(None)),
    ];

    leaf.prop_recursive(5, 48, 3, |inner| {
        let maybe = || proptest::option::of(inner.clone().prop_map(Box::new));
        let control = prop_oneof![
            (inner.clone(), inner.clone(), maybe())
                .prop_map(|(c, t, e)| Node::If(Box::new(c), Box::new(t), e)),
            (inner.clone(), inner.clone()).prop_map(|(c, b)| Node::While(Box::new(c), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Node::And(Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Node::Or(Box::new(l), Box::new(r))),
            maybe().prop_map(Node::Break),
            maybe().prop_map(Node::Next),
            maybe().prop_map(Node::Return),
        ];
        let data = prop_oneof![
            (0..LOCALS.len(), inner.clone()).prop_map(|(i, n)| Node::Assign(i, Box::new(n))),
            (inner.clone(), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(r, args)| Node::Call(Box::new(r), args)),
            (inner.clone(), any::<bool>()).prop_map(|(b, p)| Node::Closure(Box::new(b), p)),
            (prop::collection::vec(inner.clone(), 0..4), inner.clone())
                .prop_map(|(stats, e)| Node::Seq(stats, Box::new(e))),
            (inner.clone(), any::<bool>(), maybe()).prop_map(|(b, c, e)| Node::Rescue(Box::new(b), c, e)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Node::Array),
        ];
        prop_oneof![control, data]
    })
}

struct TreeBuilder<'a> {
    fx: &'a Fixture,
    locals: Vec<LocalRef>,
    closure_params: u32,
}

impl<'a> TreeBuilder<'a> {
    fn new(fx: &'a Fixture) -> Self {
        Self {
            fx,
            locals: LOCALS.iter().map(|name| fx.local(name)).collect(),
            closure_params: 0,
        }
    }

    fn opt(&mut self, node: &Option<Box<Node>>) -> Option<Expr> {
        node.as_ref().map(|node| self.build(node))
    }

    fn build(&mut self, node: &Node) -> Expr {
        let fx = self.fx;
        match node {
            Node::Int(value) => mk::int(*value),
            Node::Nil => mk::nil(),
            Node::True => mk::true_(),
            Node::SelfRef => mk::self_(),
            Node::Local(index) => mk::local(self.locals[*index]),
            Node::Unsupported(index) => mk::unsupported(UnsupportedConstruct::ALL[*index]),
            Node::Break(value) => mk::break_(self.opt(value)),
            Node::Next(value) => mk::next(self.opt(value)),
            Node::Return(value) => mk::return_(self.opt(value)),
            Node::Assign(index, rhs) => mk::assign(self.locals[*index], self.build(rhs)),
            Node::If(cond, then_branch, else_branch) => {
                let cond = self.build(cond);
                let then_branch = self.build(then_branch);
                mk::if_(cond, then_branch, self.opt(else_branch))
            }
            Node::While(cond, body) => {
                let cond = self.build(cond);
                mk::while_(cond, self.build(body))
            }
            Node::And(left, right) => {
                let left = self.build(left);
                mk::and(left, self.build(right))
            }
            Node::Or(left, right) => {
                let left = self.build(left);
                mk::or(left, self.build(right))
            }
            Node::Call(recv, args) => {
                let recv = self.build(recv);
                let args = args.iter().map(|arg| self.build(arg)).collect();
                mk::send(recv, fx.name("call"), args)
            }
            Node::Closure(body, with_param) => {
                let mut params = Vec::new();
                let mut body = self.build(body);
                if *with_param {
                    // Every closure gets its own parameter, as after renaming
                    self.closure_params += 1;
                    let param = LocalRef {
                        name: fx.name("p"),
                        unique: self.closure_params,
                    };
                    params.push(mk::param(param));
                    body = mk::ins_seq(vec![fx.call("use", vec![mk::local(param)])], body);
                }
                mk::send_with_closure(mk::self_(), fx.name("each"), vec![], mk::closure(params, body))
            }
            Node::Seq(stats, expr) => {
                let stats = stats.iter().map(|stat| self.build(stat)).collect();
                mk::ins_seq(stats, self.build(expr))
            }
            Node::Rescue(body, clause, ensure) => {
                let body = self.build(body);
                let ensure = self.opt(ensure);
                let clauses = if *clause || ensure.is_none() {
                    let class = mk::constant(fx.symbol("StandardError"));
                    vec![mk::rescue_clause(vec![class], Some(self.locals[2]), mk::local(self.locals[2]))]
                } else {
                    Vec::new()
                };
                mk::rescue(body, clauses, None, ensure)
            }
            Node::Array(elems) => mk::array(elems.iter().map(|elem| self.build(elem)).collect()),
        }
    }
}

fn method_of(fx: &Fixture, node: &Node) -> MethodDef {
    let body = TreeBuilder::new(fx).build(node);
    fx.method("prop", vec![fx.param("a")], body)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_lowered_graphs_verify(node in node()) {
        let fx = Fixture::new();
        let result = fx.try_lower(&method_of(&fx, &node));
        prop_assert!(result.is_ok(), "{:?}", result.as_ref().err());

        let cfg = result.unwrap();
        let violations = cfg.verify();
        prop_assert!(violations.is_empty(), "{:?}\n{}", violations, fx.text(&cfg));
    }

    #[test]
    fn prop_lowering_is_deterministic(node in node()) {
        let fx = Fixture::new();
        let method = method_of(&fx, &node);
        let first = fx.try_lower(&method).map(|cfg| fx.text(&cfg));
        let second = fx.try_lower(&method).map(|cfg| fx.text(&cfg));
        prop_assert_eq!(first.ok(), second.ok());
    }

    #[test]
    fn prop_every_block_is_ordered_and_dominated(node in node()) {
        let fx = Fixture::new().with_config(LoweringConfig::default().verify_after_build(false));
        let cfg = fx.lower(&method_of(&fx, &node));

        let order = cfg.reverse_postorder();
        prop_assert_eq!(order.len(), cfg.len());
        prop_assert_eq!(order.first().copied(), Some(cfg.entry()));

        let idoms = cfg.immediate_dominators();
        prop_assert_eq!(idoms[cfg.entry().index()], None);
        for block in cfg.blocks().iter().skip(1) {
            prop_assert!(idoms[block.id.index()].is_some(), "{} has no dominator", block.id);
        }
    }
}
