use super::payload::QuestionPayload;
use super::Question;
use crate::db::now_ts;
use crate::error::{BankError, BankResult};
use crate::model::{QuestionSource, QuestionStatus, QuestionType};
use rusqlite::{params, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Type-independent columns of a question about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseFields {
    pub group_id: String,
    pub title: String,
    pub content: String,
    pub scratchpad: Option<String>,
    pub source: QuestionSource,
    pub status: QuestionStatus,
    pub tags: Vec<String>,
}

/// Deep-copies the type-specific content of one question type.
///
/// Implementations write through the caller's transaction only and return
/// the new question row.
pub trait Replicator: Send + Sync {
    fn question_type(&self) -> QuestionType;

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question>;
}

pub struct ReplicatorRegistry {
    replicators: BTreeMap<QuestionType, Box<dyn Replicator>>,
}

impl ReplicatorRegistry {
    /// One replicator per question type, checked for gaps and duplicates.
    pub fn new() -> BankResult<Self> {
        Self::from_replicators(QuestionType::ALL.into_iter().map(replicator_for).collect())
    }

    /// Builds a registry from an explicit list, refusing duplicates and gaps.
    pub fn from_replicators(list: Vec<Box<dyn Replicator>>) -> BankResult<Self> {
        let mut replicators = BTreeMap::new();
        for r in list {
            let t = r.question_type();
            if replicators.insert(t, r).is_some() {
                return Err(BankError::DuplicateReplicator(t));
            }
        }
        if let Some(missing) = QuestionType::ALL
            .into_iter()
            .find(|t| !replicators.contains_key(t))
        {
            return Err(BankError::UnregisteredType(missing));
        }
        Ok(Self { replicators })
    }

    pub fn get(&self, question_type: QuestionType) -> BankResult<&dyn Replicator> {
        self.replicators
            .get(&question_type)
            .map(|r| r.as_ref())
            .ok_or(BankError::UnregisteredType(question_type))
    }

    pub fn len(&self) -> usize {
        self.replicators.len()
    }
}

fn replicator_for(question_type: QuestionType) -> Box<dyn Replicator> {
    match question_type {
        QuestionType::MultipleChoice => Box::new(MultipleChoiceReplicator),
        QuestionType::TrueFalse => Box::new(TrueFalseReplicator),
        QuestionType::Essay => Box::new(EssayReplicator),
        QuestionType::Web => Box::new(WebReplicator),
        QuestionType::ExactMatch => Box::new(ExactMatchReplicator),
        QuestionType::Code => Box::new(CodeReplicator),
        QuestionType::Database => Box::new(DatabaseReplicator),
    }
}

fn require<'a, T>(
    relation: &'a Option<T>,
    source: &QuestionPayload,
    name: &'static str,
) -> BankResult<&'a T> {
    relation.as_ref().ok_or_else(|| BankError::MissingRelation {
        question_id: source.id.clone(),
        relation: name,
    })
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn insert_question(
    tx: &Transaction<'_>,
    question_type: QuestionType,
    base: &BaseFields,
) -> BankResult<Question> {
    let id = new_id();
    let ts = now_ts();
    tx.execute(
        "INSERT INTO questions(
            id, group_id, type, status, source, title, content, scratchpad, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            base.group_id,
            question_type.as_str(),
            base.status.as_str(),
            base.source.as_str(),
            base.title,
            base.content,
            base.scratchpad,
            ts,
            ts
        ],
    )?;
    let mut tag_stmt =
        tx.prepare("INSERT OR IGNORE INTO question_tags(question_id, label) VALUES(?, ?)")?;
    for label in &base.tags {
        tag_stmt.execute(params![id, label])?;
    }

    Ok(Question {
        id,
        question_type,
        status: base.status,
        source: base.source,
        title: base.title.clone(),
        content: base.content.clone(),
        scratchpad: base.scratchpad.clone(),
        group_id: base.group_id.clone(),
        created_at: ts.clone(),
        updated_at: ts,
    })
}

pub struct MultipleChoiceReplicator;

impl Replicator for MultipleChoiceReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::MultipleChoice
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let mc = require(&source.multiple_choice, source, "multipleChoice")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO multiple_choice(
                question_id, grading_policy, activate_student_comment, student_comment_label,
                activate_selection_limit, selection_limit
             ) VALUES(?, ?, ?, ?, ?, ?)",
            params![
                question.id,
                mc.grading_policy,
                mc.activate_student_comment,
                mc.student_comment_label,
                mc.activate_selection_limit,
                mc.selection_limit
            ],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO multiple_choice_options(id, question_id, order_index, text, is_correct)
             VALUES(?, ?, ?, ?, ?)",
        )?;
        for option in &mc.options {
            stmt.execute(params![
                new_id(),
                question.id,
                option.order,
                option.text,
                option.is_correct
            ])?;
        }
        Ok(question)
    }
}

pub struct TrueFalseReplicator;

impl Replicator for TrueFalseReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::TrueFalse
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let tf = require(&source.true_false, source, "trueFalse")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO true_false(question_id, is_true) VALUES(?, ?)",
            params![question.id, tf.is_true],
        )?;
        Ok(question)
    }
}

pub struct EssayReplicator;

impl Replicator for EssayReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Essay
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let essay = require(&source.essay, source, "essay")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO essay(question_id, solution, template) VALUES(?, ?, ?)",
            params![question.id, essay.solution, essay.template],
        )?;
        Ok(question)
    }
}

pub struct WebReplicator;

impl Replicator for WebReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Web
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let web = require(&source.web, source, "web")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO web(
                question_id, template_html, template_css, template_js,
                solution_html, solution_css, solution_js
             ) VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                question.id,
                web.template_html,
                web.template_css,
                web.template_js,
                web.solution_html,
                web.solution_css,
                web.solution_js
            ],
        )?;
        Ok(question)
    }
}

pub struct ExactMatchReplicator;

impl Replicator for ExactMatchReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::ExactMatch
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let em = require(&source.exact_match, source, "exactMatch")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO exact_match(question_id) VALUES(?)",
            params![question.id],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO exact_match_fields(id, question_id, order_index, statement, match_regex)
             VALUES(?, ?, ?, ?, ?)",
        )?;
        for field in &em.fields {
            stmt.execute(params![
                new_id(),
                question.id,
                field.order,
                field.statement,
                field.match_regex
            ])?;
        }
        Ok(question)
    }
}

pub struct CodeReplicator;

impl Replicator for CodeReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Code
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let code = require(&source.code, source, "code")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO code(question_id, language, sandbox_image, sandbox_before_all)
             VALUES(?, ?, ?, ?)",
            params![
                question.id,
                code.language,
                code.sandbox_image,
                code.sandbox_before_all
            ],
        )?;

        let mut files = tx.prepare(
            "INSERT INTO code_files(id, question_id, nature, order_index, path, content, student_permission)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
        )?;
        let natures = [
            ("TEMPLATE", &code.template_files),
            ("SOLUTION", &code.solution_files),
        ];
        for (nature, list) in natures {
            for file in list {
                files.execute(params![
                    new_id(),
                    question.id,
                    nature,
                    file.order,
                    file.path,
                    file.content,
                    file.student_permission
                ])?;
            }
        }

        let mut cases = tx.prepare(
            "INSERT INTO code_test_cases(id, question_id, idx, exec, input, expected_output)
             VALUES(?, ?, ?, ?, ?, ?)",
        )?;
        for case in &code.test_cases {
            cases.execute(params![
                new_id(),
                question.id,
                case.index,
                case.exec,
                case.input,
                case.expected_output
            ])?;
        }
        Ok(question)
    }
}

pub struct DatabaseReplicator;

impl Replicator for DatabaseReplicator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Database
    }

    fn replicate(
        &self,
        tx: &Transaction<'_>,
        source: &QuestionPayload,
        base: &BaseFields,
    ) -> BankResult<Question> {
        let database = require(&source.database, source, "database")?;
        let question = insert_question(tx, self.question_type(), base)?;
        tx.execute(
            "INSERT INTO database_questions(question_id, image) VALUES(?, ?)",
            params![question.id, database.image],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO database_queries(
                id, question_id, order_index, title, description, content, template, student_permission
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for query in &database.queries {
            stmt.execute(params![
                new_id(),
                question.id,
                query.order,
                query.title,
                query.description,
                query.content,
                query.template,
                query.student_permission
            ])?;
        }
        Ok(question)
    }
}
