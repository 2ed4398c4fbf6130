//! The grammar of emerge source files, written with the DSL.
//!
//! Declarations and statements end with `;`, except for `while` loops
//! and class declarations, which end with their block. Expressions are
//! layered by precedence, loosest first: comparisons, additive and
//! multiplicative operators, prefix operators, then postfix invocation,
//! member access and `!!`. `if` is an expression; both of its branches
//! are blocks, and `else if` chains nest.

use std::sync::Arc;

use crate::ast::{
    ClassDeclaration, ClassMember, Declaration, ElseBranch, Expression, FunctionBody,
    FunctionDeclaration, ImportDeclaration, PackageName, Parameter, SourceFile, Statement,
    TypeArgument, TypeMutability, TypeParameter, TypeReference, TypeVariance, VariableDeclaration,
    Visibility,
};
use crate::diagnostic::ParsingMismatch;
use crate::error::{GrammarError, TransformError};
use crate::rule::{Grammar, GrammarBuilder, Rule};
use crate::token::{Keyword, Operator, Token};
use crate::value::{Items, Value};

pub const IMPORT_ALL_HINT: &str = "to import all exports of the package write some_package.*";

const COMPARISON_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::IdentityEq,
    Operator::IdentityNeq,
    Operator::LessThan,
    Operator::LessThanOrEquals,
    Operator::GreaterThan,
    Operator::GreaterThanOrEquals,
];

const FUNCTION_MODIFIERS: &[Keyword] = &[
    Keyword::Nothrow,
    Keyword::Pure,
    Keyword::Intrinsic,
    Keyword::External,
    Keyword::Operator,
];

/// A built source-file grammar and the rules callers start matches from.
/// Build it once and share it between parses.
pub struct SourceGrammar {
    grammar: Grammar,
    source_file: Rule<SourceFile>,
    expression: Rule<Expression>,
    type_reference: Rule<TypeReference>,
}

impl SourceGrammar {
    pub fn new() -> Result<Self, GrammarError> {
        let mut g = GrammarBuilder::new();

        let expression = g.declare::<Expression>("expression");
        let unary = g.declare::<Expression>("unary expression");
        let statement = g.declare::<Statement>("statement");
        let if_expression = g.declare::<Expression>("if expression");
        let block = code_block(&mut g, statement);
        let primary = primary_expression(&mut g, expression, if_expression);
        let postfix = postfix_expression(&mut g, primary, expression);
        let unary_body = unary_expression(&mut g, unary, postfix);
        g.define(unary, unary_body)?;
        let multiplicative = binary_expression(
            &mut g,
            "multiplicative expression",
            unary,
            &[Operator::Times, Operator::Divide],
        );
        let additive = binary_expression(
            &mut g,
            "additive expression",
            multiplicative,
            &[Operator::Plus, Operator::Minus],
        );
        let comparison = binary_expression(&mut g, "comparison", additive, COMPARISON_OPERATORS);
        g.define(expression, comparison)?;
        let if_body = if_expression_body(&mut g, if_expression, expression, block);
        g.define(if_expression, if_body)?;

        let package_name = package_name(&mut g);
        let type_reference = type_reference(&mut g)?;
        let visibility = visibility(&mut g, package_name);
        let variable = variable_declaration(&mut g, visibility, type_reference, expression);
        let statement_body = statement_kinds(&mut g, variable, expression, block);
        g.define(statement, statement_body)?;
        let parameter = parameter(&mut g, type_reference);
        let function = function_declaration(
            &mut g,
            visibility,
            parameter,
            type_reference,
            block,
            expression,
        );
        let class = class_declaration(&mut g, visibility, type_reference, variable, function, block);
        let package = package_declaration(&mut g, package_name);
        let import = import_declaration(&mut g);
        let source_file = source_file(&mut g, package, import, variable, function, class);

        Ok(SourceGrammar {
            grammar: g.build()?,
            source_file,
            expression,
            type_reference,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// A whole file, up to and including the end of input.
    pub fn source_file(&self) -> Rule<SourceFile> {
        self.source_file
    }

    pub fn expression(&self) -> Rule<Expression> {
        self.expression
    }

    pub fn type_reference(&self) -> Rule<TypeReference> {
        self.type_reference
    }
}

fn unexpected(building: &'static str, expected: &'static str, found: &Token) -> TransformError {
    TransformError::UnexpectedItem {
        building,
        expected,
        found: found.to_string(),
    }
}

fn next_expression(items: &mut Items) -> Result<Expression, TransformError> {
    items.next_node::<Expression>().map(Arc::unwrap_or_clone)
}

fn next_block(items: &mut Items) -> Result<Vec<Statement>, TransformError> {
    items.next_node::<Vec<Statement>>().map(Arc::unwrap_or_clone)
}

/// `{ statement* }`
fn code_block(g: &mut GrammarBuilder, statement: Rule<Statement>) -> Rule<Vec<Statement>> {
    g.sequence(|s| {
        s.operator(Operator::CurlyOpen)
            .repeating(|statements| {
                statements.refer(statement);
            })
            .operator(Operator::CurlyClose);
    })
    .named(g, "code block")
    .ast_transformation(g, "code block", |items| {
        items.next_operator(Operator::CurlyOpen)?;
        let mut statements = Vec::new();
        while let Some(statement) = items.next_node_if::<Statement>() {
            statements.push(Arc::unwrap_or_clone(statement));
        }
        items.next_operator(Operator::CurlyClose)?;
        Ok(statements)
    })
}

fn primary_expression(
    g: &mut GrammarBuilder,
    expression: Rule<Expression>,
    if_expression: Rule<Expression>,
) -> Rule<Expression> {
    g.either_of(|e| {
        e.identifier()
            .numeric_literal()
            .sequence(|string| {
                string
                    .operator(Operator::StringDelimiter)
                    .string_literal_content()
                    .operator(Operator::StringDelimiter);
            })
            .sequence(|parenthesised| {
                parenthesised
                    .operator(Operator::ParenOpen)
                    .refer(expression)
                    .operator(Operator::ParenClose);
            })
            .sequence(|array| {
                array
                    .operator(Operator::SquareOpen)
                    .optional(|elements| {
                        elements.refer(expression).repeating(|more| {
                            more.operator(Operator::Comma).refer(expression);
                        });
                    })
                    .operator(Operator::SquareClose);
            })
            .refer(if_expression);
    })
    .ast_transformation(g, "primary expression", |items| {
        if let Some(conditional) = items.next_node_if::<Expression>() {
            return Ok(Arc::unwrap_or_clone(conditional));
        }
        let first = items.next_token()?;
        match first.as_operator() {
            Some(Operator::StringDelimiter) => Ok(Expression::StringLiteral(items.next_token()?)),
            Some(Operator::ParenOpen) => next_expression(items),
            Some(Operator::SquareOpen) => {
                let mut elements = Vec::new();
                while !items.skip_operator(Operator::SquareClose) {
                    elements.push(next_expression(items)?);
                    items.skip_operator(Operator::Comma);
                }
                Ok(Expression::ArrayLiteral(elements))
            }
            Some(_) => Err(unexpected("primary expression", "operand", &first)),
            None if first.as_identifier().is_some() => Ok(Expression::Identifier(first)),
            None => Ok(Expression::NumericLiteral(first)),
        }
    })
}

fn postfix_expression(
    g: &mut GrammarBuilder,
    primary: Rule<Expression>,
    expression: Rule<Expression>,
) -> Rule<Expression> {
    g.sequence(|s| {
        s.refer(primary).repeating(|r| {
            r.either_of(|e| {
                e.sequence(|call| {
                    call.operator(Operator::ParenOpen)
                        .optional(|arguments| {
                            arguments.refer(expression).repeating(|more| {
                                more.operator(Operator::Comma).refer(expression);
                            });
                        })
                        .operator(Operator::ParenClose);
                })
                .sequence(|member| {
                    member
                        .either_of(|dot| {
                            dot.operator(Operator::Dot).operator(Operator::SafeDot);
                        })
                        .identifier();
                })
                .operator(Operator::NotNull);
            });
        });
    })
    .ast_transformation(g, "postfix expression", |items| {
        let mut expression = next_expression(items)?;
        loop {
            let suffix = match items.peek() {
                Some(Value::Token(token)) => token.as_operator(),
                _ => None,
            };
            expression = match suffix {
                Some(Operator::ParenOpen) => {
                    items.next_operator(Operator::ParenOpen)?;
                    let mut arguments = Vec::new();
                    while !items.skip_operator(Operator::ParenClose) {
                        arguments.push(next_expression(items)?);
                        items.skip_operator(Operator::Comma);
                    }
                    Expression::Invocation {
                        callee: Box::new(expression),
                        arguments,
                    }
                }
                Some(dot @ (Operator::Dot | Operator::SafeDot)) => {
                    items.next_operator(dot)?;
                    Expression::MemberAccess {
                        target: Box::new(expression),
                        member: items.next_identifier()?,
                        is_safe: dot == Operator::SafeDot,
                    }
                }
                Some(Operator::NotNull) => {
                    items.next_operator(Operator::NotNull)?;
                    Expression::NotNull(Box::new(expression))
                }
                _ => break,
            };
        }
        Ok(expression)
    })
}

/// `if cond { .. } [else { .. } | else if ..]`
fn if_expression_body(
    g: &mut GrammarBuilder,
    if_expression: Rule<Expression>,
    expression: Rule<Expression>,
    block: Rule<Vec<Statement>>,
) -> Rule<Expression> {
    g.sequence(|s| {
        s.keyword(Keyword::If)
            .refer(expression)
            .refer(block)
            .optional(|otherwise| {
                otherwise.keyword(Keyword::Else).either_of(|e| {
                    e.refer(block).refer(if_expression);
                });
            });
    })
    .ast_transformation(g, "if expression", |items| {
        items.next_keyword(Keyword::If)?;
        let condition = next_expression(items)?;
        let then_branch = next_block(items)?;
        let else_branch = match items.next_if_keyword(Keyword::Else) {
            None => None,
            Some(_) => match items.next_node_if::<Vec<Statement>>() {
                Some(block) => Some(ElseBranch::Block(Arc::unwrap_or_clone(block))),
                None => Some(ElseBranch::If(Box::new(next_expression(items)?))),
            },
        };
        Ok(Expression::If {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        })
    })
}

fn unary_expression(
    g: &mut GrammarBuilder,
    unary: Rule<Expression>,
    postfix: Rule<Expression>,
) -> Rule<Expression> {
    g.either_of(|e| {
        e.sequence(|prefixed| {
            prefixed
                .either_of(|operator| {
                    operator
                        .operator(Operator::Minus)
                        .operator(Operator::ExclamationMark);
                })
                .refer(unary);
        })
        .refer(postfix);
    })
    .ast_transformation(g, "unary expression", |items| {
        if !matches!(items.peek(), Some(Value::Token(_))) {
            return next_expression(items);
        }
        let operator = items.next_any_operator()?;
        Ok(Expression::Unary {
            operator,
            operand: Box::new(next_expression(items)?),
        })
    })
}

/// One precedence level: `operand (operator operand)*`, folded to the left.
fn binary_expression(
    g: &mut GrammarBuilder,
    building: &'static str,
    operand: Rule<Expression>,
    operators: &[Operator],
) -> Rule<Expression> {
    g.sequence(|s| {
        s.refer(operand).repeating(|r| {
            r.either_of(|e| {
                for operator in operators {
                    e.operator(*operator);
                }
            })
            .refer(operand);
        });
    })
    .named(g, building)
    .ast_transformation(g, building, |items| {
        let mut left = next_expression(items)?;
        while items.has_next() {
            let operator = items.next_any_operator()?;
            let right = next_expression(items)?;
            left = Expression::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    })
}

fn package_name(g: &mut GrammarBuilder) -> Rule<PackageName> {
    g.sequence(|s| {
        s.identifier().repeating(|r| {
            r.operator(Operator::Dot).identifier();
        });
    })
    .ast_transformation(g, "package name", |items| {
        let mut segments = vec![items.next_identifier()?];
        while items.skip_operator(Operator::Dot) {
            segments.push(items.next_identifier()?);
        }
        Ok(PackageName { segments })
    })
}

fn optional_variance(items: &mut Items) -> TypeVariance {
    let keyword = items
        .next_if_keyword(Keyword::In)
        .or_else(|| items.next_if_keyword(Keyword::Out));
    TypeVariance::from_keyword(keyword.as_ref().and_then(Token::as_keyword))
}

/// `[mut|read|immutable] Name [<[in|out] Type, ..>] [?]`
fn type_reference(g: &mut GrammarBuilder) -> Result<Rule<TypeReference>, GrammarError> {
    let type_reference = g.declare::<TypeReference>("type reference");
    let argument = g
        .sequence(|s| {
            s.optional(|variance| {
                variance.either_of(|e| {
                    e.keyword(Keyword::In).keyword(Keyword::Out);
                });
            })
            .refer(type_reference);
        })
        .ast_transformation(g, "type argument", |items| {
            let variance = optional_variance(items);
            let type_reference = Arc::unwrap_or_clone(items.next_node::<TypeReference>()?);
            Ok(TypeArgument {
                variance,
                type_reference,
            })
        });
    let body = g
        .sequence(|s| {
            s.optional(|mutability| {
                mutability.either_of(|e| {
                    e.keyword(Keyword::Mutable)
                        .keyword(Keyword::ReadOnly)
                        .keyword(Keyword::Immutable);
                });
            })
            .identifier()
            .optional(|arguments| {
                arguments
                    .operator(Operator::LessThan)
                    .refer(argument)
                    .repeating(|more| {
                        more.operator(Operator::Comma).refer(argument);
                    })
                    .operator(Operator::GreaterThan);
            })
            .optional(|nullable| {
                nullable.operator(Operator::QuestionMark);
            });
        })
        .ast_transformation(g, "type reference", |items| {
            let keyword = items
                .peek()
                .and_then(Value::as_token)
                .and_then(Token::as_keyword);
            let mutability = match keyword {
                Some(keyword) => {
                    items.next_token()?;
                    TypeMutability::from_keyword(keyword)
                }
                None => None,
            };
            let name = items.next_identifier()?;
            let mut arguments = Vec::new();
            if items.skip_operator(Operator::LessThan) {
                while let Some(argument) = items.next_node_if::<TypeArgument>() {
                    arguments.push(Arc::unwrap_or_clone(argument));
                    items.skip_operator(Operator::Comma);
                }
                items.next_operator(Operator::GreaterThan)?;
            }
            Ok(TypeReference {
                mutability,
                name,
                arguments,
                nullable: items.skip_operator(Operator::QuestionMark),
            })
        });
    g.define(type_reference, body)?;
    Ok(type_reference)
}

fn visibility(g: &mut GrammarBuilder, package_name: Rule<PackageName>) -> Rule<Visibility> {
    g.either_of(|e| {
        e.keyword(Keyword::Private)
            .keyword(Keyword::Module)
            .keyword(Keyword::Export)
            .sequence(|package| {
                package
                    .keyword(Keyword::Package)
                    .operator(Operator::ParenOpen)
                    .refer(package_name)
                    .operator(Operator::ParenClose);
            });
    })
    .ast_transformation(g, "visibility", |items| {
        let keyword = items.next_token()?;
        match keyword.as_keyword() {
            Some(Keyword::Private) => Ok(Visibility::Private),
            Some(Keyword::Module) => Ok(Visibility::Module),
            Some(Keyword::Export) => Ok(Visibility::Export),
            Some(Keyword::Package) => {
                items.next_operator(Operator::ParenOpen)?;
                let name = items.next_node::<PackageName>()?;
                Ok(Visibility::Package(Arc::unwrap_or_clone(name)))
            }
            _ => Err(unexpected("visibility", "visibility keyword", &keyword)),
        }
    })
}

/// `[visibility] var name [: Type] [= expr]`, or the final forms
/// `name = expr` and `name: Type [= expr]`. The terminator belongs to
/// the caller.
fn variable_declaration(
    g: &mut GrammarBuilder,
    visibility: Rule<Visibility>,
    type_reference: Rule<TypeReference>,
    expression: Rule<Expression>,
) -> Rule<VariableDeclaration> {
    g.sequence(|s| {
        s.optional(|o| {
            o.refer(visibility);
        })
        .either_of(|e| {
            e.sequence(|reassignable| {
                reassignable
                    .keyword(Keyword::Var)
                    .identifier()
                    .optional(|typed| {
                        typed.operator(Operator::Colon).refer(type_reference);
                    })
                    .optional(|initialized| {
                        initialized.operator(Operator::Assignment).refer(expression);
                    });
            })
            .sequence(|fixed| {
                fixed.identifier().either_of(|rest| {
                    rest.sequence(|initialized| {
                        initialized.operator(Operator::Assignment).refer(expression);
                    })
                    .sequence(|typed| {
                        typed
                            .operator(Operator::Colon)
                            .refer(type_reference)
                            .optional(|initialized| {
                                initialized.operator(Operator::Assignment).refer(expression);
                            });
                    });
                });
            });
        });
    })
    .named(g, "variable declaration")
    .ast_transformation(g, "variable declaration", |items| {
        let visibility = items.next_node_if::<Visibility>().map(Arc::unwrap_or_clone);
        let is_reassignable = items.next_if_keyword(Keyword::Var).is_some();
        let name = items.next_identifier()?;
        let declared_type = if items.skip_operator(Operator::Colon) {
            Some(Arc::unwrap_or_clone(items.next_node::<TypeReference>()?))
        } else {
            None
        };
        let initializer = if items.skip_operator(Operator::Assignment) {
            Some(next_expression(items)?)
        } else {
            None
        };
        Ok(VariableDeclaration {
            visibility,
            is_reassignable,
            name,
            declared_type,
            initializer,
        })
    })
}

fn statement_kinds(
    g: &mut GrammarBuilder,
    variable: Rule<VariableDeclaration>,
    expression: Rule<Expression>,
    block: Rule<Vec<Statement>>,
) -> Rule<Statement> {
    g.either_of(|e| {
        e.sequence(|declaration| {
            declaration.refer(variable).operator(Operator::Semicolon);
        })
        .sequence(|assignment| {
            assignment
                .keyword(Keyword::Set)
                .refer(expression)
                .operator(Operator::Assignment)
                .refer(expression)
                .operator(Operator::Semicolon);
        })
        .sequence(|ret| {
            ret.keyword(Keyword::Return)
                .optional(|value| {
                    value.refer(expression);
                })
                .operator(Operator::Semicolon);
        })
        .sequence(|throw| {
            throw
                .keyword(Keyword::Throw)
                .refer(expression)
                .operator(Operator::Semicolon);
        })
        .sequence(|looped| {
            looped
                .keyword(Keyword::While)
                .refer(expression)
                .refer(block);
        })
        .sequence(|jump| {
            jump.keyword(Keyword::Break).operator(Operator::Semicolon);
        })
        .sequence(|jump| {
            jump.keyword(Keyword::Continue).operator(Operator::Semicolon);
        })
        .sequence(|evaluated| {
            evaluated.refer(expression).operator(Operator::Semicolon);
        });
    })
    .ast_transformation(g, "statement", |items| {
        if let Some(variable) = items.next_node_if::<VariableDeclaration>() {
            return Ok(Statement::Variable(Arc::unwrap_or_clone(variable)));
        }
        let keyword = items
            .peek()
            .and_then(Value::as_token)
            .and_then(Token::as_keyword);
        if keyword.is_some() {
            items.next_token()?;
        }
        match keyword {
            Some(Keyword::Set) => {
                let target = next_expression(items)?;
                items.next_operator(Operator::Assignment)?;
                let value = next_expression(items)?;
                Ok(Statement::Assignment { target, value })
            }
            Some(Keyword::Return) => {
                let value = items.next_node_if::<Expression>().map(Arc::unwrap_or_clone);
                Ok(Statement::Return(value))
            }
            Some(Keyword::Throw) => Ok(Statement::Throw(next_expression(items)?)),
            Some(Keyword::While) => {
                let condition = next_expression(items)?;
                let body = next_block(items)?;
                Ok(Statement::While { condition, body })
            }
            Some(Keyword::Break) => Ok(Statement::Break),
            Some(Keyword::Continue) => Ok(Statement::Continue),
            _ => Ok(Statement::Expression(next_expression(items)?)),
        }
    })
}

fn parameter(g: &mut GrammarBuilder, type_reference: Rule<TypeReference>) -> Rule<Parameter> {
    g.sequence(|s| {
        s.identifier()
            .operator(Operator::Colon)
            .refer(type_reference);
    })
    .ast_transformation(g, "parameter", |items| {
        let name = items.next_identifier()?;
        items.next_operator(Operator::Colon)?;
        let declared_type = Arc::unwrap_or_clone(items.next_node::<TypeReference>()?);
        Ok(Parameter {
            name,
            declared_type,
        })
    })
}

fn function_declaration(
    g: &mut GrammarBuilder,
    visibility: Rule<Visibility>,
    parameter: Rule<Parameter>,
    type_reference: Rule<TypeReference>,
    block: Rule<Vec<Statement>>,
    expression: Rule<Expression>,
) -> Rule<FunctionDeclaration> {
    g.sequence(|s| {
        s.optional(|o| {
            o.refer(visibility);
        })
        .repeating(|modifiers| {
            modifiers.either_of(|e| {
                for modifier in FUNCTION_MODIFIERS {
                    e.keyword(*modifier);
                }
            });
        })
        .keyword(Keyword::Function)
        .identifier()
        .operator(Operator::ParenOpen)
        .optional(|parameters| {
            parameters.refer(parameter).repeating(|more| {
                more.operator(Operator::Comma).refer(parameter);
            });
        })
        .operator(Operator::ParenClose)
        .optional(|returns| {
            returns.operator(Operator::Returns).refer(type_reference);
        })
        .either_of(|body| {
            body.refer(block).sequence(|single| {
                single
                    .operator(Operator::Assignment)
                    .refer(expression)
                    .operator(Operator::Semicolon);
            })
            .operator(Operator::Semicolon);
        });
    })
    .named(g, "function declaration")
    .ast_transformation(g, "function declaration", |items| {
        let visibility = items.next_node_if::<Visibility>().map(Arc::unwrap_or_clone);
        let mut modifiers = Vec::new();
        loop {
            let token = items.next_token()?;
            match token.as_keyword() {
                Some(Keyword::Function) => break,
                Some(modifier) => modifiers.push(modifier),
                None => return Err(unexpected("function declaration", "modifier", &token)),
            }
        }
        let name = items.next_identifier()?;

        items.next_operator(Operator::ParenOpen)?;
        let mut parameters = Vec::new();
        while let Some(parameter) = items.next_node_if::<Parameter>() {
            parameters.push(Arc::unwrap_or_clone(parameter));
            items.skip_operator(Operator::Comma);
        }
        items.next_operator(Operator::ParenClose)?;

        let return_type = if items.skip_operator(Operator::Returns) {
            Some(Arc::unwrap_or_clone(items.next_node::<TypeReference>()?))
        } else {
            None
        };

        let body = if let Some(block) = items.next_node_if::<Vec<Statement>>() {
            FunctionBody::Block(Arc::unwrap_or_clone(block))
        } else if items.skip_operator(Operator::Assignment) {
            FunctionBody::SingleExpression(next_expression(items)?)
        } else {
            items.next_operator(Operator::Semicolon)?;
            FunctionBody::Absent
        };

        Ok(FunctionDeclaration {
            visibility,
            modifiers,
            name,
            parameters,
            return_type,
            body,
        })
    })
}

fn type_parameter(
    g: &mut GrammarBuilder,
    type_reference: Rule<TypeReference>,
) -> Rule<TypeParameter> {
    g.sequence(|s| {
        s.optional(|variance| {
            variance.either_of(|e| {
                e.keyword(Keyword::In).keyword(Keyword::Out);
            });
        })
        .identifier()
        .optional(|bound| {
            bound.operator(Operator::Colon).refer(type_reference);
        });
    })
    .ast_transformation(g, "type parameter", |items| {
        let variance = optional_variance(items);
        let name = items.next_identifier()?;
        let bound = if items.skip_operator(Operator::Colon) {
            Some(Arc::unwrap_or_clone(items.next_node::<TypeReference>()?))
        } else {
            None
        };
        Ok(TypeParameter {
            variance,
            name,
            bound,
        })
    })
}

fn class_member(
    g: &mut GrammarBuilder,
    variable: Rule<VariableDeclaration>,
    function: Rule<FunctionDeclaration>,
    block: Rule<Vec<Statement>>,
) -> Rule<ClassMember> {
    g.either_of(|e| {
        e.sequence(|field| {
            field.refer(variable).operator(Operator::Semicolon);
        })
        .refer(function)
        .sequence(|constructor| {
            constructor.local_keyword("constructor").refer(block);
        })
        .sequence(|destructor| {
            destructor.local_keyword("destructor").refer(block);
        });
    })
    .named(g, "class member")
    .ast_transformation(g, "class member", |items| {
        if let Some(variable) = items.next_node_if::<VariableDeclaration>() {
            items.next_operator(Operator::Semicolon)?;
            return Ok(ClassMember::Variable(Arc::unwrap_or_clone(variable)));
        }
        if let Some(function) = items.next_node_if::<FunctionDeclaration>() {
            return Ok(ClassMember::Function(Arc::unwrap_or_clone(function)));
        }
        let keyword = items.next_identifier()?;
        let body = next_block(items)?;
        match keyword.as_identifier() {
            Some("constructor") => Ok(ClassMember::Constructor(body)),
            Some("destructor") => Ok(ClassMember::Destructor(body)),
            _ => Err(unexpected("class member", "constructor or destructor", &keyword)),
        }
    })
}

/// `[visibility] class Name [<T, ..>] { member* }`
fn class_declaration(
    g: &mut GrammarBuilder,
    visibility: Rule<Visibility>,
    type_reference: Rule<TypeReference>,
    variable: Rule<VariableDeclaration>,
    function: Rule<FunctionDeclaration>,
    block: Rule<Vec<Statement>>,
) -> Rule<ClassDeclaration> {
    let parameter = type_parameter(g, type_reference);
    let member = class_member(g, variable, function, block);
    g.sequence(|s| {
        s.optional(|o| {
            o.refer(visibility);
        })
        .keyword(Keyword::Class)
        .identifier()
        .optional(|parameters| {
            parameters
                .operator(Operator::LessThan)
                .refer(parameter)
                .repeating(|more| {
                    more.operator(Operator::Comma).refer(parameter);
                })
                .operator(Operator::GreaterThan);
        })
        .operator(Operator::CurlyOpen)
        .repeating(|members| {
            members.refer(member);
        })
        .operator(Operator::CurlyClose);
    })
    .named(g, "class declaration")
    .ast_transformation(g, "class declaration", |items| {
        let visibility = items.next_node_if::<Visibility>().map(Arc::unwrap_or_clone);
        items.next_keyword(Keyword::Class)?;
        let name = items.next_identifier()?;
        let mut type_parameters = Vec::new();
        if items.skip_operator(Operator::LessThan) {
            while let Some(parameter) = items.next_node_if::<TypeParameter>() {
                type_parameters.push(Arc::unwrap_or_clone(parameter));
                items.skip_operator(Operator::Comma);
            }
            items.next_operator(Operator::GreaterThan)?;
        }
        items.next_operator(Operator::CurlyOpen)?;
        let mut members = Vec::new();
        while let Some(member) = items.next_node_if::<ClassMember>() {
            members.push(Arc::unwrap_or_clone(member));
        }
        items.next_operator(Operator::CurlyClose)?;
        Ok(ClassDeclaration {
            visibility,
            name,
            type_parameters,
            members,
        })
    })
}

fn package_declaration(g: &mut GrammarBuilder, package_name: Rule<PackageName>) -> Rule<PackageName> {
    g.sequence(|s| {
        s.keyword(Keyword::Package)
            .refer(package_name)
            .operator(Operator::Semicolon);
    })
    .ast_transformation(g, "package declaration", |items| {
        items.next_keyword(Keyword::Package)?;
        items.next_node::<PackageName>().map(Arc::unwrap_or_clone)
    })
}

/// `import a.b.c;` and `import a.b.*;`. A lone `import a;` is rejected
/// with a hint towards the wildcard form.
fn import_declaration(g: &mut GrammarBuilder) -> Rule<ImportDeclaration> {
    g.sequence(|s| {
        s.keyword(Keyword::Import)
            .repeating_at_least_once(|r| {
                r.identifier().operator(Operator::Dot);
            })
            .identifier_accepting(&[], &[Operator::Times])
            .operator(Operator::Semicolon);
    })
    .named(g, "import declaration")
    .enhance_errors(
        g,
        |mismatch: &ParsingMismatch| {
            mismatch.expected_alternatives == ["dot"]
                && mismatch.actual.as_operator() == Some(Operator::Semicolon)
        },
        |mismatch| mismatch.with_hint(IMPORT_ALL_HINT),
    )
    .ast_transformation(g, "import declaration", |items| {
        let keyword = items.next_keyword(Keyword::Import)?;
        let mut segments = Vec::new();
        loop {
            segments.push(items.next_token()?);
            if !items.skip_operator(Operator::Dot) {
                break;
            }
        }
        Ok(ImportDeclaration { keyword, segments })
    })
}

fn source_file(
    g: &mut GrammarBuilder,
    package: Rule<PackageName>,
    import: Rule<ImportDeclaration>,
    variable: Rule<VariableDeclaration>,
    function: Rule<FunctionDeclaration>,
    class: Rule<ClassDeclaration>,
) -> Rule<SourceFile> {
    g.sequence(|s| {
        s.optional(|o| {
            o.refer(package);
        })
        .repeating(|declarations| {
            declarations.either_of(|e| {
                e.refer(import)
                    .sequence(|declaration| {
                        declaration.refer(variable).operator(Operator::Semicolon);
                    })
                    .refer(function)
                    .refer(class);
            });
        })
        .end_of_input();
    })
    .named(g, "source file")
    .ast_transformation(g, "source file", |items| {
        let package = items.next_node_if::<PackageName>().map(Arc::unwrap_or_clone);
        let mut imports = Vec::new();
        let mut declarations = Vec::new();
        while items.has_next() {
            if let Some(import) = items.next_node_if::<ImportDeclaration>() {
                imports.push(Arc::unwrap_or_clone(import));
            } else if let Some(variable) = items.next_node_if::<VariableDeclaration>() {
                declarations.push(Declaration::Variable(Arc::unwrap_or_clone(variable)));
                items.next_operator(Operator::Semicolon)?;
            } else if let Some(class) = items.next_node_if::<ClassDeclaration>() {
                declarations.push(Declaration::Class(Arc::unwrap_or_clone(class)));
            } else {
                let function = items.next_node::<FunctionDeclaration>()?;
                declarations.push(Declaration::Function(Arc::unwrap_or_clone(function)));
            }
        }
        Ok(SourceFile {
            package,
            imports,
            declarations,
        })
    })
}
