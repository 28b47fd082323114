//! 目标行解析
//!
//! 行格式：`host:port:username:password_or_keypath`，按 `:` 切分：
//!
//! | 字段 | 缺省 |
//! |---|---|
//! | 1 host | 必填 |
//! | 2 port | 缺失或非数字时为 22 |
//! | 3 username | 缺失时使用任务级默认用户名（默认 `root`） |
//! | 4 secret | 以 `/` 开头为私钥路径，否则为密码；缺失时使用任务级默认密码 |
//!
//! 第四个字段之后的内容被忽略。

use crate::constants::DEFAULT_SSH_PORT;
use crate::error::{CoreError, Result};
use crate::inspection_types::{Credential, Target};

/// 解析目标时使用的任务级默认值
#[derive(Debug, Clone, Copy)]
pub struct TargetDefaults<'a> {
    pub username: &'a str,
    pub password: Option<&'a str>,
}

/// 解析后的目标行，尚未合并任务级默认值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLine {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub credential: Option<Credential>,
}

impl TargetLine {
    /// 解析单行；该函数对任意输入都有结果，合法性在 `resolve` 中检查
    pub fn parse(line: &str) -> Self {
        let mut fields = line.trim().split(':');

        let host = fields.next().unwrap_or_default().trim().to_string();
        let port = fields
            .next()
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_SSH_PORT);
        let username = fields
            .next()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let credential = fields
            .next()
            .filter(|s| !s.is_empty())
            .map(Credential::from_secret);

        Self {
            host,
            port,
            username,
            credential,
        }
    }

    /// 合并默认值并校验，得到最终目标
    pub fn resolve(self, defaults: &TargetDefaults<'_>) -> Result<Target> {
        let credential = self
            .credential
            .or_else(|| defaults.password.map(|p| Credential::Password(p.to_string())))
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "target {:?} has no password or key and no default password was given",
                    self.host
                ))
            })?;

        let target = Target {
            host: self.host,
            port: self.port,
            username: self
                .username
                .unwrap_or_else(|| defaults.username.to_string()),
            credential,
        };
        target.validate()?;
        Ok(target)
    }
}

/// 解析主机清单：跳过空行与 `#` 注释行
pub fn parse_target_list(text: &str) -> Vec<TargetLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(TargetLine::parse)
        .collect()
}
