use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use uuid::Uuid;

use crate::common::error::{Error, Result};
use crate::protocol::session::{RequestOptions, SecurityType, Session};
use crate::protocol::{body, crypto, header};

/// 认证标签长度
pub const AUTH_LEN: usize = 16;
/// 响应头长度(解密前后一致)
const RESPONSE_HEADER_LEN: usize = 4;

/// 认证扫描起点之后固定 +30s(与协议端的时钟偏移容忍一致)
const AUTH_SKEW_AHEAD: u64 = 30;
/// 起点之前的默认扫描窗口(秒)。上限收紧到固定窗口,认证失败时
/// 不会退化成对全部历史时间戳的遍历。
pub const DEFAULT_AUTH_WINDOW: u64 = 120;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

enum RequestState {
    Unauthenticated,
    Authenticated { timestamp: u64 },
    HeaderDecoded { session: Session, header_len: usize },
    BodyDecoded { session: Session },
}

/// 客户端方向(请求)包解码器。
///
/// 方法必须按 `authenticate` → `decode_header` → `decode_body` 的顺序
/// 调用,乱序返回 `InvalidState`;状态用枚举承载,不存在哨兵值。
pub struct RequestDecoder<'a> {
    uuid: Uuid,
    data: &'a [u8],
    auth_window: u64,
    state: RequestState,
}

impl<'a> RequestDecoder<'a> {
    pub fn new(uuid: Uuid, data: &'a [u8]) -> Self {
        Self {
            uuid,
            data,
            auth_window: DEFAULT_AUTH_WINDOW,
            state: RequestState::Unauthenticated,
        }
    }

    /// 覆盖认证扫描在起点之前允许回溯的秒数
    pub fn with_auth_window(mut self, seconds: u64) -> Self {
        self.auth_window = seconds;
        self
    }

    /// 在时间窗内暴力匹配认证标签,返回恢复出的时间戳。
    ///
    /// `start_time` 缺省取当前墙钟;从 `start_time + 30` 向下扫到
    /// `start_time - window`,倒序偏向较新的时间戳。
    pub fn authenticate(&mut self, start_time: Option<u64>) -> Result<u64> {
        if !matches!(self.state, RequestState::Unauthenticated) {
            return Err(Error::InvalidState("authenticate"));
        }
        let tag = self.data.get(..AUTH_LEN).ok_or(Error::UnexpectedEof)?;
        let start = start_time.unwrap_or_else(unix_now);

        let upper = start.saturating_add(AUTH_SKEW_AHEAD);
        let lower = start.saturating_sub(self.auth_window);
        for timestamp in (lower..=upper).rev() {
            if crypto::verify_auth_tag(self.uuid.as_bytes(), timestamp, tag) {
                debug!(timestamp, "auth tag matched");
                self.state = RequestState::Authenticated { timestamp };
                return Ok(timestamp);
            }
        }
        Err(Error::AuthFailed)
    }

    /// 解密并解析请求头,返回提取出的会话参数。
    pub fn decode_header(&mut self) -> Result<Session> {
        let timestamp = match self.state {
            RequestState::Authenticated { timestamp } => timestamp,
            _ => return Err(Error::InvalidState("decode_header")),
        };
        let (session, header_len) =
            header::decode_request_header(self.uuid.as_bytes(), timestamp, &self.data[AUTH_LEN..])?;
        self.state = RequestState::HeaderDecoded {
            session: session.clone(),
            header_len,
        };
        Ok(session)
    }

    /// 解码请求方向的 body,按序返回明文帧。
    pub fn decode_body(&mut self) -> Result<Vec<Vec<u8>>> {
        let (session, header_len) = match &self.state {
            RequestState::HeaderDecoded {
                session,
                header_len,
            } => (session.clone(), *header_len),
            _ => return Err(Error::InvalidState("decode_body")),
        };
        let frames = body::decode_stream(
            &self.data[AUTH_LEN + header_len..],
            &session.body_key,
            &session.body_iv,
            &session.options,
            session.security,
        )?;
        self.state = RequestState::BodyDecoded { session };
        Ok(frames)
    }

    /// 头部解码之后可随时取用的会话参数
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            RequestState::HeaderDecoded { session, .. } => Some(session),
            RequestState::BodyDecoded { session } => Some(session),
            _ => None,
        }
    }
}

enum ResponseState {
    Pending,
    HeaderDecoded,
    BodyDecoded,
}

/// 服务端方向(响应)包解码器。
///
/// 密钥材料来自配对请求:客户端方向的 key/iv 在这里做 MD5 派生。
pub struct ResponseDecoder<'a> {
    response_header: u8,
    server_key: [u8; 16],
    server_iv: [u8; 16],
    options: RequestOptions,
    security: SecurityType,
    data: &'a [u8],
    state: ResponseState,
}

impl<'a> ResponseDecoder<'a> {
    pub fn new(
        response_header: u8,
        client_iv: &[u8; 16],
        client_key: &[u8; 16],
        options: RequestOptions,
        security: SecurityType,
        data: &'a [u8],
    ) -> Self {
        let (server_key, server_iv) = crypto::derive_response_key_iv(client_key, client_iv);
        Self {
            response_header,
            server_key,
            server_iv,
            options,
            security,
            data,
            state: ResponseState::Pending,
        }
    }

    /// 直接从请求方向解出的会话构造
    pub fn from_session(session: &Session, data: &'a [u8]) -> Self {
        Self::new(
            session.response_header,
            &session.body_iv,
            &session.body_key,
            session.options,
            session.security,
            data,
        )
    }

    /// 解密 4 字节响应头并校验回显
    pub fn decode_header(&mut self) -> Result<()> {
        if !matches!(self.state, ResponseState::Pending) {
            return Err(Error::InvalidState("decode_header"));
        }
        header::decode_response_header(
            &self.server_key,
            &self.server_iv,
            self.response_header,
            self.data,
        )?;
        self.state = ResponseState::HeaderDecoded;
        Ok(())
    }

    /// 解码响应方向的 body,按序返回明文帧。
    pub fn decode_body(&mut self) -> Result<Vec<Vec<u8>>> {
        if !matches!(self.state, ResponseState::HeaderDecoded) {
            return Err(Error::InvalidState("decode_body"));
        }
        let frames = body::decode_stream(
            &self.data[RESPONSE_HEADER_LEN..],
            &self.server_key,
            &self.server_iv,
            &self.options,
            self.security,
        )?;
        self.state = ResponseState::BodyDecoded;
        Ok(frames)
    }
}
