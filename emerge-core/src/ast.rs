//! Syntax tree built by the source-file grammar.

use std::fmt;

use crate::token::{Keyword, Operator, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub package: Option<PackageName>,
    pub imports: Vec<ImportDeclaration>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageName {
    pub segments: Vec<Token>,
}

impl PackageName {
    pub fn dotted(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.as_identifier().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// `import a.b.c;` or `import a.b.*;`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    pub keyword: Token,
    /// Identifiers, the last one possibly being the `*` operator.
    pub segments: Vec<Token>,
}

impl ImportDeclaration {
    pub fn imports_everything(&self) -> bool {
        self.segments
            .last()
            .is_some_and(|segment| segment.as_operator() == Some(Operator::Times))
    }

    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment.as_identifier() {
                Some(name) => name,
                None => "*",
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    Private,
    Module,
    Package(PackageName),
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMutability {
    Mutable,
    ReadOnly,
    Immutable,
}

impl TypeMutability {
    pub fn from_keyword(keyword: Keyword) -> Option<Self> {
        match keyword {
            Keyword::Mutable => Some(TypeMutability::Mutable),
            Keyword::ReadOnly => Some(TypeMutability::ReadOnly),
            Keyword::Immutable => Some(TypeMutability::Immutable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeVariance {
    Unspecified,
    In,
    Out,
}

impl TypeVariance {
    pub fn from_keyword(keyword: Option<Keyword>) -> Self {
        match keyword {
            Some(Keyword::In) => TypeVariance::In,
            Some(Keyword::Out) => TypeVariance::Out,
            _ => TypeVariance::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeReference {
    pub mutability: Option<TypeMutability>,
    pub name: Token,
    /// Generic arguments, as in `Array<out Any>`.
    pub arguments: Vec<TypeArgument>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeArgument {
    pub variance: TypeVariance,
    pub type_reference: TypeReference,
}

/// `[in|out] T [: Bound]` in a class header.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParameter {
    pub variance: TypeVariance,
    pub name: Token,
    pub bound: Option<TypeReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub visibility: Option<Visibility>,
    /// Declared with `var`; otherwise the binding is final.
    pub is_reassignable: bool,
    pub name: Token,
    pub declared_type: Option<TypeReference>,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Token,
    pub declared_type: TypeReference,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    SingleExpression(Expression),
    /// Declaration only, as for intrinsic and external functions.
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub visibility: Option<Visibility>,
    pub modifiers: Vec<Keyword>,
    pub name: Token,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeReference>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Variable(VariableDeclaration),
    Function(FunctionDeclaration),
    Constructor(Vec<Statement>),
    Destructor(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    pub visibility: Option<Visibility>,
    pub name: Token,
    pub type_parameters: Vec<TypeParameter>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Variable(VariableDeclaration),
    Function(FunctionDeclaration),
    Class(ClassDeclaration),
}

impl Declaration {
    pub fn name(&self) -> &Token {
        match self {
            Declaration::Variable(variable) => &variable.name,
            Declaration::Function(function) => &function.name,
            Declaration::Class(class) => &class.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Variable(VariableDeclaration),
    Assignment { target: Expression, value: Expression },
    Return(Option<Expression>),
    Throw(Expression),
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Break,
    Continue,
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    Block(Vec<Statement>),
    /// `else if ...`, always an [`Expression::If`].
    If(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Token),
    NumericLiteral(Token),
    /// The content token of a string literal.
    StringLiteral(Token),
    Unary {
        operator: Operator,
        operand: Box<Expression>,
    },
    Binary {
        operator: Operator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Invocation {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    MemberAccess {
        target: Box<Expression>,
        member: Token,
        is_safe: bool,
    },
    NotNull(Box<Expression>),
    ArrayLiteral(Vec<Expression>),
    If {
        condition: Box<Expression>,
        then_branch: Vec<Statement>,
        else_branch: Option<ElseBranch>,
    },
}

/// Fully parenthesised rendering, so that nesting is visible.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(token) | Expression::NumericLiteral(token) => {
                write_token_text(f, token)
            }
            Expression::StringLiteral(token) => {
                f.write_str("\"")?;
                write_token_text(f, token)?;
                f.write_str("\"")
            }
            Expression::Unary { operator, operand } => {
                write!(f, "({}{operand})", operator.text())
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => write!(f, "({left} {} {right})", operator.text()),
            Expression::Invocation { callee, arguments } => {
                write!(f, "{callee}(")?;
                write_list(f, arguments)?;
                f.write_str(")")
            }
            Expression::MemberAccess {
                target,
                member,
                is_safe,
            } => {
                write!(f, "{target}{}", if *is_safe { "?." } else { "." })?;
                write_token_text(f, member)
            }
            Expression::NotNull(target) => write!(f, "{target}!!"),
            Expression::ArrayLiteral(elements) => {
                f.write_str("[")?;
                write_list(f, elements)?;
                f.write_str("]")
            }
            Expression::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "(if {condition} ")?;
                write_block(f, then_branch)?;
                match else_branch {
                    Some(ElseBranch::Block(statements)) => {
                        f.write_str(" else ")?;
                        write_block(f, statements)?;
                    }
                    Some(ElseBranch::If(nested)) => write!(f, " else {nested}")?,
                    None => {}
                }
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, expressions: &[Expression]) -> fmt::Result {
    for (index, expression) in expressions.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{expression}")?;
    }
    Ok(())
}

/// Blocks render as their statement count; statements have no textual form.
fn write_block(f: &mut fmt::Formatter<'_>, statements: &[Statement]) -> fmt::Result {
    write!(f, "{{{}}}", statements.len())
}

fn write_token_text(f: &mut fmt::Formatter<'_>, token: &Token) -> fmt::Result {
    match &token.kind {
        TokenKind::Identifier(text)
        | TokenKind::NumericLiteral(text)
        | TokenKind::StringLiteralContent(text) => f.write_str(text),
        other => write!(f, "{other}"),
    }
}
