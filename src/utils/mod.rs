use bcrypt::{hash, verify};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::models::CreateUserRequest;

pub const PASSWORD_MIN_LEN: usize = 6;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), cost)
}

/// bcrypt 自带盐并且常量时间比较
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 字段级校验错误，作为数据返回而不是控制流
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub tag: String,
    pub value: String,
}

impl FieldError {
    fn new(field: &str, tag: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }
}

/// 邮箱统一去空格并转小写后再存储和查询
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// 每个字段只报告第一个失败的规则
pub fn validate_new_user(req: &CreateUserRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if req.name.trim().is_empty() {
        errors.push(FieldError::new("name", "required", ""));
    }

    if req.email.trim().is_empty() {
        errors.push(FieldError::new("email", "required", ""));
    } else if !is_valid_email(&req.email) {
        errors.push(FieldError::new("email", "email", ""));
    }

    if req.password.is_empty() {
        errors.push(FieldError::new("password", "required", ""));
    } else if req.password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(FieldError::new(
            "password",
            "min",
            &PASSWORD_MIN_LEN.to_string(),
        ));
    }

    errors
}
