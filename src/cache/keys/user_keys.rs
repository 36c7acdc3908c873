/// 按 ID 查询的用户缓存键前缀
const USER_ID_PREFIX: &str = "user:";

/// 按邮箱查询的用户缓存键前缀
const USER_EMAIL_PREFIX: &str = "user:email:";

/// 生成按 ID 查询的用户缓存键，ID 只含数字，不会与邮箱命名空间冲突
pub fn user_id_key(id: u64) -> String {
    format!("{}{}", USER_ID_PREFIX, id)
}

/// 生成按邮箱查询的用户缓存键
pub fn user_email_key(email: &str) -> String {
    format!("{}{}", USER_EMAIL_PREFIX, email)
}
