//! 宿主值模型
//!
//! 脚本可见的所有值类型。堆上变体以 `Rc` 共享，相等性按身份比较
//! （与宿主的 rawequal 语义一致），标量按值比较。

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::HostError;
use crate::host::chunk::Chunk;
use crate::host::engine::CallCtx;
use crate::host::strand::Strand;

/// 脚本值
#[derive(Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    Integer(i64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Table(Rc<Table>),
    Function(Rc<Function>),
    UserData(Rc<UserData>),
    Strand(Rc<Strand>),
    LightPtr(*mut ()),
}

/// 值的类型标签（联合类型转换按标签匹配）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Nil,
    Boolean,
    Number,
    Integer,
    Str,
    Bytes,
    Table,
    Function,
    UserData,
    Strand,
    LightPtr,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeTag::Nil => "nil",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::Integer => "integer",
            TypeTag::Str => "string",
            TypeTag::Bytes => "bytes",
            TypeTag::Table => "table",
            TypeTag::Function => "function",
            TypeTag::UserData => "userdata",
            TypeTag::Strand => "strand",
            TypeTag::LightPtr => "lightptr",
        })
    }
}

impl Value {
    /// 值的类型标签
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Nil => TypeTag::Nil,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::Integer(_) => TypeTag::Integer,
            Value::Str(_) => TypeTag::Str,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::Table(_) => TypeTag::Table,
            Value::Function(_) => TypeTag::Function,
            Value::UserData(_) => TypeTag::UserData,
            Value::Strand(_) => TypeTag::Strand,
            Value::LightPtr(_) => TypeTag::LightPtr,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Rc<Table>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_user_data(&self) -> Option<&Rc<UserData>> {
        match self {
            Value::UserData(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_strand(&self) -> Option<&Rc<Strand>> {
        match self {
            Value::Strand(s) => Some(s),
            _ => None,
        }
    }

    /// 转换为表键（nil、堆上不可哈希类型不能作键）
    pub fn as_table_key(&self) -> Option<TableKey> {
        match self {
            Value::Integer(i) => Some(TableKey::Integer(*i)),
            Value::Boolean(b) => Some(TableKey::Boolean(*b)),
            Value::Str(s) => Some(TableKey::Str(s.clone())),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::UserData(a), Value::UserData(b)) => Rc::ptr_eq(a, b),
            (Value::Strand(a), Value::Strand(b)) => Rc::ptr_eq(a, b),
            (Value::LightPtr(a), Value::LightPtr(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<bytes len={}>", b.len()),
            Value::Table(t) => write!(f, "<table {:p}>", Rc::as_ptr(t)),
            Value::Function(fun) => match &fun.name {
                Some(name) => write!(f, "<function {name}>"),
                None => write!(f, "<function {:p}>", Rc::as_ptr(fun)),
            },
            Value::UserData(u) => write!(f, "<userdata {}>", u.caps.type_name),
            Value::Strand(s) => write!(f, "<strand {}>", s.id()),
            Value::LightPtr(p) => write!(f, "<lightptr {p:p}>"),
        }
    }
}

/// 表键（字符串、整数或布尔）
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableKey {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
}

/// 脚本表
#[derive(Debug, Default)]
pub struct Table {
    entries: RefCell<HashMap<TableKey, Value>>,
}

impl Table {
    pub fn new() -> Rc<Table> {
        Rc::new(Table::default())
    }

    pub fn get(&self, key: &TableKey) -> Value {
        self.entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn set(&self, key: TableKey, value: Value) {
        if value.is_nil() {
            self.entries.borrow_mut().remove(&key);
        } else {
            self.entries.borrow_mut().insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// 原生蹦床：按被包装可调用对象的类型单态化出的普通函数指针
pub type RawNative = fn(&mut CallCtx<'_>) -> Result<usize, HostError>;

/// 原生函数：蹦床 + 上值（上值 0 通常是存放可调用对象的 userdata 单元）
pub struct NativeFn {
    pub(crate) trampoline: RawNative,
    pub(crate) upvalues: Vec<Value>,
}

/// 函数对象
pub struct Function {
    pub(crate) name: Option<String>,
    pub(crate) kind: FunctionKind,
}

pub enum FunctionKind {
    /// 字节码函数
    Chunk(Rc<Chunk>),
    /// 原生函数
    Native(NativeFn),
}

impl Function {
    pub fn from_chunk(chunk: Rc<Chunk>) -> Rc<Function> {
        Rc::new(Function {
            name: Some(chunk.name().to_string()),
            kind: FunctionKind::Chunk(chunk),
        })
    }

    pub(crate) fn native(name: Option<String>, trampoline: RawNative, upvalues: Vec<Value>) -> Rc<Function> {
        Rc::new(Function {
            name,
            kind: FunctionKind::Native(NativeFn { trampoline, upvalues }),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, FunctionKind::Native(_))
    }
}

/// 终结器钩子：在 userdata 单元释放前恰好调用一次
pub type Finalizer = Box<dyn Fn(&mut dyn Any)>;

/// 能力表：按类型静态构建的方法分发表 + 可选终结器
///
/// 替代动态元表查找：方法按名字注册一次，调用时直接查表。
pub struct CapTable {
    pub(crate) type_name: &'static str,
    pub(crate) methods: HashMap<String, Rc<Function>>,
    pub(crate) finalizer: Option<Finalizer>,
}

impl CapTable {
    /// 无方法、无终结器的能力表
    pub fn plain(type_name: &'static str) -> Rc<CapTable> {
        Rc::new(CapTable {
            type_name,
            methods: HashMap::new(),
            finalizer: None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }
}

impl fmt::Debug for CapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapTable")
            .field("type_name", &self.type_name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("has_finalizer", &self.finalizer.is_some())
            .finish()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("native", &self.is_native())
            .finish()
    }
}

/// userdata：宿主托管的不透明原生单元 + 能力表
pub struct UserData {
    pub(crate) cell: RefCell<Box<dyn Any>>,
    pub(crate) caps: Rc<CapTable>,
}

impl UserData {
    pub(crate) fn new(payload: Box<dyn Any>, caps: Rc<CapTable>) -> Rc<UserData> {
        Rc::new(UserData {
            cell: RefCell::new(payload),
            caps,
        })
    }

    pub fn caps(&self) -> &Rc<CapTable> {
        &self.caps
    }

    /// 借用单元内容并向下转型
    ///
    /// 单元正在被借用（方法重入）或类型不符时返回 None。
    pub fn with_payload<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut cell = self.cell.try_borrow_mut().ok()?;
        cell.downcast_mut::<T>().map(f)
    }
}

impl Drop for UserData {
    fn drop(&mut self) {
        // 宿主保证终结器只运行一次：这里是唯一的调用点
        if let Some(finalizer) = &self.caps.finalizer {
            finalizer(&mut **self.cell.borrow_mut());
        }
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<userdata {}>", self.caps.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_equality() {
        assert_eq!(Value::Integer(3), Value::Integer(3));
        assert_ne!(Value::Integer(3), Value::Number(3.0));
        assert_eq!(Value::Str(Rc::from("abc")), Value::Str(Rc::from("abc")));
        assert_eq!(Value::Nil, Value::Nil);
    }

    #[test]
    fn test_heap_identity_equality() {
        let a = Table::new();
        let b = Table::new();
        assert_eq!(Value::Table(a.clone()), Value::Table(a.clone()));
        assert_ne!(Value::Table(a), Value::Table(b));
    }

    #[test]
    fn test_table_get_set() {
        let t = Table::new();
        let key = TableKey::Str(Rc::from("x"));
        assert_eq!(t.get(&key), Value::Nil);
        t.set(key.clone(), Value::Integer(7));
        assert_eq!(t.get(&key), Value::Integer(7));
        t.set(key.clone(), Value::Nil);
        assert!(t.is_empty());
    }

    #[test]
    fn test_finalizer_runs_once_on_drop() {
        use std::cell::Cell;

        let count = Rc::new(Cell::new(0u32));
        let observed = count.clone();
        let caps = Rc::new(CapTable {
            type_name: "probe",
            methods: HashMap::new(),
            finalizer: Some(Box::new(move |_| observed.set(observed.get() + 1))),
        });
        let ud = UserData::new(Box::new(41u32), caps);
        assert_eq!(count.get(), 0);
        drop(ud);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_number_coercion_accessor() {
        assert_eq!(Value::Integer(2).as_number(), Some(2.0));
        assert_eq!(Value::Number(2.5).as_number(), Some(2.5));
        assert_eq!(Value::Str(Rc::from("2")).as_number(), None);
    }
}
